//! Sync handshake
//!
//! STEP1 carries the sender's state vector and is answered with a STEP2
//! holding whatever the sender is missing. A document counts as synced once
//! a STEP2 has been received for it. UPDATE carries live changes.

use crate::error::{ProviderError, Result};
use crate::provider::Shared;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info};
use ymux_core::Engine;
use ymux_protocol::{is_empty_update, SyncMessage};

/// Whether a document has received its STEP2
#[derive(Debug, Default)]
pub(crate) struct SyncState {
    synced: AtomicBool,
    notify: Notify,
}

impl SyncState {
    pub(crate) fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn mark_synced(&self) -> bool {
        let first = !self.synced.swap(true, Ordering::AcqRel);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub(crate) async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_synced() {
            return;
        }
        notified.await;
    }
}

/// Handle one sync message for `doc_id`
pub(crate) fn handle(
    shared: &Shared,
    doc_id: &str,
    engine: &Arc<dyn Engine>,
    message: SyncMessage,
) -> Result<()> {
    let Some(state) = shared.state(doc_id) else {
        return Ok(());
    };
    debug!(doc_id = %doc_id, step = message.name(), bytes = message.payload().len(), "Sync message received");

    match message {
        SyncMessage::Step1(state_vector) => {
            let update = engine
                .update_for(&state_vector)
                .map_err(ProviderError::engine(doc_id))?;
            shared.send(&SyncMessage::step2(update).encode(), doc_id)?;

            if !state.is_synced() {
                let step1 = SyncMessage::step1(engine.state_vector());
                shared.send(&step1.encode(), doc_id)?;
            }
        }
        SyncMessage::Step2(update) => {
            if !is_empty_update(&update) {
                engine.apply(&update).map_err(ProviderError::engine(doc_id))?;
            }
            if state.mark_synced() {
                info!(doc_id = %doc_id, "Document synced");
            }
        }
        SyncMessage::Update(update) => {
            if !is_empty_update(&update) {
                engine.apply(&update).map_err(ProviderError::engine(doc_id))?;
            }
        }
    }

    Ok(())
}
