//! Document types and the engine collaborator

use crate::error::{Error, Result};
use crate::parser::{self, DeltaOp, Edit, EntryAction, MapDiff};
use crate::value::{ContentKind, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use yrs::types::{Change, Delta, EntryChange};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Array, ArrayRef, Doc, GetString, Map, MapRef, Observable, OffsetKind, Options, Origin,
    Out, ReadTxn, StateVector, Text, TextRef, Transact, Update,
};

/// Maximum document ID length in bytes
pub const MAX_ID_LEN: usize = 512;

/// Name of the root shared type holding a document's content
const ROOT: &str = "content";

/// Transaction origin attached to updates received from a peer
const REMOTE_ORIGIN: &str = "ymux-remote";

/// Document identifier - non-empty UTF-8 string, max 512 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new document ID, validating its length
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidDocumentId("Document ID cannot be empty".into()));
        }

        if id.len() > MAX_ID_LEN {
            return Err(Error::InvalidDocumentId(format!(
                "Document ID exceeds {} bytes",
                MAX_ID_LEN
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Callback receiving the encoded update of a local change
pub type UpdateCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Keeps an engine observer registered until dropped
pub struct Subscription {
    // engine guards only have to be Send; the mutex makes the handle Sync
    _guard: Mutex<Box<dyn Send>>,
}

impl Subscription {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _guard: Mutex::new(Box::new(guard)),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// The CRDT engine as seen by the synchronization layer.
///
/// State vectors and updates are opaque bytes in the engine's binary format.
pub trait Engine: Send + Sync {
    /// Kind of content this document holds
    fn kind(&self) -> ContentKind;

    /// Summary of everything this replica has incorporated
    fn state_vector(&self) -> Vec<u8>;

    /// Update carrying everything missing from a peer with `state_vector`
    fn update_for(&self, state_vector: &[u8]) -> Result<Vec<u8>>;

    /// Merge an update received from a peer
    fn apply(&self, update: &[u8]) -> Result<()>;

    /// Register `callback` for the update of every local transaction.
    ///
    /// Updates merged through [`Engine::apply`] are not reported.
    fn observe(&self, callback: UpdateCallback) -> Result<Subscription>;
}

/// Edits produced by one change event, by content kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "edits", rename_all = "kebab-case")]
pub enum ContentEdits {
    Text(Vec<Edit<String>>),
    Sequence(Vec<Edit<Vec<Value>>>),
    Map(MapDiff<Value>),
}

enum Root {
    Text(TextRef),
    Sequence(ArrayRef),
    Map(MapRef),
}

/// A yrs-backed document with a single root shared type
pub struct Document {
    kind: ContentKind,
    ydoc: Doc,
    root: Root,
}

impl Document {
    /// Create an empty document of the given kind
    pub fn new(kind: ContentKind) -> Self {
        let ydoc = Doc::with_options(Options {
            offset_kind: OffsetKind::Bytes,
            ..Options::default()
        });
        let root = match kind {
            ContentKind::Text => Root::Text(ydoc.get_or_insert_text(ROOT)),
            ContentKind::Sequence => Root::Sequence(ydoc.get_or_insert_array(ROOT)),
            ContentKind::Map => Root::Map(ydoc.get_or_insert_map(ROOT)),
        };

        Self { kind, ydoc, root }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The underlying yrs document, for multi-operation transactions
    pub fn ydoc(&self) -> &Doc {
        &self.ydoc
    }

    /// Insert `chunk` at UTF-8 byte offset `index`
    pub fn insert_text(&self, index: u32, chunk: &str) -> Result<()> {
        let text = self.text_ref()?;
        let mut txn = self.ydoc.transact_mut();
        text.insert(&mut txn, index, chunk);
        Ok(())
    }

    /// Append `chunk` to the end of the text
    pub fn push_text(&self, chunk: &str) -> Result<()> {
        let text = self.text_ref()?;
        let mut txn = self.ydoc.transact_mut();
        let end = text.len(&txn);
        text.insert(&mut txn, end, chunk);
        Ok(())
    }

    /// Remove `len` bytes starting at byte offset `index`
    pub fn remove_text(&self, index: u32, len: u32) -> Result<()> {
        let text = self.text_ref()?;
        let mut txn = self.ydoc.transact_mut();
        text.remove_range(&mut txn, index, len);
        Ok(())
    }

    pub fn text(&self) -> Result<String> {
        let text = self.text_ref()?;
        let txn = self.ydoc.transact();
        Ok(text.get_string(&txn))
    }

    pub fn insert_items(&self, index: u32, items: Vec<Value>) -> Result<()> {
        let array = self.sequence_ref()?;
        let mut txn = self.ydoc.transact_mut();
        array.insert_range(&mut txn, index, items.into_iter().map(Any::from));
        Ok(())
    }

    pub fn push_items(&self, items: Vec<Value>) -> Result<()> {
        let array = self.sequence_ref()?;
        let mut txn = self.ydoc.transact_mut();
        let end = array.len(&txn);
        array.insert_range(&mut txn, end, items.into_iter().map(Any::from));
        Ok(())
    }

    pub fn remove_items(&self, index: u32, len: u32) -> Result<()> {
        let array = self.sequence_ref()?;
        let mut txn = self.ydoc.transact_mut();
        array.remove_range(&mut txn, index, len);
        Ok(())
    }

    pub fn items(&self) -> Result<Vec<Value>> {
        let array = self.sequence_ref()?;
        let txn = self.ydoc.transact();
        Ok(array.iter(&txn).map(|item| value_from_out(&item, &txn)).collect())
    }

    pub fn set_entry(&self, key: &str, value: Value) -> Result<()> {
        let map = self.map_ref()?;
        let mut txn = self.ydoc.transact_mut();
        map.insert(&mut txn, key, Any::from(value));
        Ok(())
    }

    pub fn remove_entry(&self, key: &str) -> Result<()> {
        let map = self.map_ref()?;
        let mut txn = self.ydoc.transact_mut();
        map.remove(&mut txn, key);
        Ok(())
    }

    pub fn entries(&self) -> Result<HashMap<String, Value>> {
        let map = self.map_ref()?;
        let txn = self.ydoc.transact();
        Ok(map
            .iter(&txn)
            .map(|(key, value)| (key.to_string(), value_from_out(&value, &txn)))
            .collect())
    }

    /// Run the matching delta parser on every change of the content and
    /// hand the resulting edits to `sink`.
    ///
    /// `sink` runs inside the engine's commit and must not open a
    /// transaction on this document.
    pub fn observe_edits<F>(&self, sink: F) -> Subscription
    where
        F: Fn(ContentEdits) + Send + Sync + 'static,
    {
        match &self.root {
            Root::Text(text) => Subscription::new(text.observe(move |txn, event| {
                let delta = event.delta(txn).iter().filter_map(text_op);
                let mut edits = Vec::new();
                parser::parse_text_delta(delta, |edit| edits.push(edit));
                if !edits.is_empty() {
                    sink(ContentEdits::Text(edits));
                }
            })),
            Root::Sequence(array) => Subscription::new(array.observe(move |txn, event| {
                let delta = event.delta(txn).iter().map(|change| match change {
                    Change::Added(items) => DeltaOp::insert(
                        items.iter().map(|item| value_from_out(item, txn)).collect(),
                    ),
                    Change::Removed(len) => DeltaOp::delete(*len),
                    Change::Retain(len) => DeltaOp::retain(*len),
                });
                let mut edits = Vec::new();
                parser::parse_sequence_delta(delta, |edit| edits.push(edit));
                if !edits.is_empty() {
                    sink(ContentEdits::Sequence(edits));
                }
            })),
            Root::Map(map) => Subscription::new(map.observe(move |txn, event| {
                let changes = event.keys(txn).iter().map(|(key, change)| {
                    let action = match change {
                        EntryChange::Inserted(new) => EntryAction::Added {
                            new: value_from_out(new, txn),
                        },
                        EntryChange::Updated(old, new) => EntryAction::Updated {
                            old: value_from_out(old, txn),
                            new: value_from_out(new, txn),
                        },
                        EntryChange::Removed(old) => EntryAction::Removed {
                            old: value_from_out(old, txn),
                        },
                    };
                    (key.to_string(), action)
                });
                let diff = parser::parse_map_changes(changes);
                if !diff.is_empty() {
                    sink(ContentEdits::Map(diff));
                }
            })),
        }
    }

    fn text_ref(&self) -> Result<&TextRef> {
        match &self.root {
            Root::Text(text) => Ok(text),
            _ => Err(self.mismatch(ContentKind::Text)),
        }
    }

    fn sequence_ref(&self) -> Result<&ArrayRef> {
        match &self.root {
            Root::Sequence(array) => Ok(array),
            _ => Err(self.mismatch(ContentKind::Sequence)),
        }
    }

    fn map_ref(&self) -> Result<&MapRef> {
        match &self.root {
            Root::Map(map) => Ok(map),
            _ => Err(self.mismatch(ContentKind::Map)),
        }
    }

    fn mismatch(&self, expected: ContentKind) -> Error {
        Error::KindMismatch {
            expected: expected.to_string(),
            got: self.kind.to_string(),
        }
    }
}

impl Engine for Document {
    fn kind(&self) -> ContentKind {
        self.kind
    }

    fn state_vector(&self) -> Vec<u8> {
        let txn = self.ydoc.transact();
        txn.state_vector().encode_v1()
    }

    fn update_for(&self, state_vector: &[u8]) -> Result<Vec<u8>> {
        let state_vector = StateVector::decode_v1(state_vector)
            .map_err(|e: yrs::encoding::read::Error| Error::Crdt(e.to_string()))?;
        let txn = self.ydoc.transact();
        Ok(txn.encode_state_as_update_v1(&state_vector))
    }

    fn apply(&self, update: &[u8]) -> Result<()> {
        let update = Update::decode_v1(update)
            .map_err(|e: yrs::encoding::read::Error| Error::Crdt(e.to_string()))?;
        let mut txn = self.ydoc.transact_mut_with(REMOTE_ORIGIN);
        txn.apply_update(update)
            .map_err(|e| Error::Crdt(e.to_string()))
    }

    fn observe(&self, callback: UpdateCallback) -> Result<Subscription> {
        let remote = Origin::from(REMOTE_ORIGIN);
        let subscription = self
            .ydoc
            .observe_update_v1(move |txn, event| {
                if txn.origin() == Some(&remote) {
                    return;
                }
                callback(&event.update);
            })
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        Ok(Subscription::new(subscription))
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .finish()
    }
}

fn text_op(delta: &Delta) -> Option<DeltaOp<String>> {
    match delta {
        Delta::Retain(len, _) => Some(DeltaOp::retain(*len)),
        Delta::Deleted(len) => Some(DeltaOp::delete(*len)),
        Delta::Inserted(Out::Any(Any::String(chunk)), _) => Some(DeltaOp::insert(chunk.to_string())),
        Delta::Inserted(_, _) => {
            warn!("Ignoring non-text embed in text delta");
            None
        }
    }
}

fn value_from_out<T: ReadTxn>(out: &Out, txn: &T) -> Value {
    match out {
        Out::Any(any) => Value::from(any),
        Out::YText(text) => Value::String(text.get_string(txn)),
        Out::YArray(array) => Value::Array(
            array
                .iter(txn)
                .map(|item| value_from_out(&item, txn))
                .collect(),
        ),
        Out::YMap(map) => Value::Object(
            map.iter(txn)
                .map(|(key, value)| (key.to_string(), value_from_out(&value, txn)))
                .collect(),
        ),
        _ => Value::Null,
    }
}
