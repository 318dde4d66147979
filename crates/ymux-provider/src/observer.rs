//! Change observer
//!
//! Forwards every local change of a document to the peer as an UPDATE. The
//! engine calls back while it holds its own transaction, so the frame is
//! only queued here and written by the provider's writer task.

use crate::error::{ProviderError, Result};
use crate::provider::Shared;
use std::sync::{Arc, Weak};
use tracing::trace;
use ymux_core::{DocumentId, Engine, Subscription};
use ymux_protocol::{is_empty_update, SyncMessage};

pub(crate) fn subscribe(
    shared: &Arc<Shared>,
    doc_id: &DocumentId,
    engine: &Arc<dyn Engine>,
) -> Result<Subscription> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let id = doc_id.clone();

    engine
        .observe(Box::new(move |update: &[u8]| {
            if is_empty_update(update) {
                return;
            }
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if shared.is_cancelled() {
                trace!(doc_id = %id, "Provider closing, dropping local update");
                return;
            }

            let message = SyncMessage::update(update.to_vec()).encode();
            if shared.send(&message, id.as_str()).is_err() {
                trace!(doc_id = %id, "Provider closed, dropping local update");
            }
        }))
        .map_err(ProviderError::engine(doc_id.as_str()))
}
