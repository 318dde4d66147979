//! ymux Core - documents, registry and delta parsing
//!
//! This crate provides the document-side building blocks of ymux:
//! - The [`Engine`] collaborator trait and its yrs-backed [`Document`]
//! - An insertion-ordered [`Registry`] of documents keyed by [`DocumentId`]
//! - Parsers turning change deltas into position-addressed [`Edit`] records
//!   and key-based [`MapDiff`]s

pub mod document;
pub mod error;
pub mod parser;
pub mod registry;
pub mod value;

pub use document::{ContentEdits, Document, DocumentId, Engine, Subscription, UpdateCallback};
pub use error::{Error, Result};
pub use parser::{DeltaOp, Edit, EntryAction, MapDiff, Payload};
pub use registry::Registry;
pub use value::{ContentKind, Value};
