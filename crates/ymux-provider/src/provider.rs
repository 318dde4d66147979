//! Connection multiplexer
//!
//! A [`Provider`] owns one connection and keeps every document of a
//! [`Registry`] synchronized over it. Frames are routed by document ID.
//!
//! Outgoing frames go through one queue drained by a single writer task, so
//! the receive loop never waits on the connection and frames never
//! interleave.

use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::{ProviderError, Result};
use crate::observer;
use crate::sync::{self, SyncState};
use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use ymux_core::{DocumentId, Engine, Registry, Subscription};
use ymux_protocol::{decode_frame, encode_frame, Message, ProtocolError, SyncMessage};

/// Upper bound for the closing handshake of an idle connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A frame waiting for the writer
struct Outbound {
    frame: Bytes,
    written: Option<oneshot::Sender<Result<()>>>,
}

/// State shared between the provider and its tasks
pub(crate) struct Shared {
    registry: Registry,
    states: HashMap<DocumentId, SyncState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    failure: Mutex<Option<ProviderError>>,
    handle: Handle,
}

impl Shared {
    pub(crate) fn state(&self, doc_id: &str) -> Option<&SyncState> {
        self.states.get(doc_id)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Frame `message` for `doc_id` and queue it for the writer
    pub(crate) fn send(&self, message: &[u8], doc_id: &str) -> Result<()> {
        self.enqueue(message, doc_id, None)
    }

    fn enqueue(
        &self,
        message: &[u8],
        doc_id: &str,
        written: Option<oneshot::Sender<Result<()>>>,
    ) -> Result<()> {
        if self.is_cancelled() {
            return Err(ProviderError::Closed);
        }
        let frame = encode_frame(doc_id, message);
        self.outbound
            .send(Outbound { frame, written })
            .map_err(|_| ProviderError::Closed)
    }

    /// Run `task` under the provider's supervision. An error tears the provider down.
    fn spawn<F>(self: &Arc<Self>, task_name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let shared = self.clone();
        self.tracker.spawn_on(
            async move {
                match task.await {
                    Ok(()) => {}
                    Err(ProviderError::Closed) if shared.is_cancelled() => {}
                    Err(e) => shared.fail(task_name, e),
                }
            },
            &self.handle,
        );
    }

    fn fail(&self, task_name: &'static str, e: ProviderError) {
        if self.is_cancelled() && matches!(e, ProviderError::Disconnected) {
            return;
        }
        error!(task = task_name, error = %e, "Provider failed");

        {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                *failure = Some(e);
            }
        }
        self.cancel.cancel();
        self.tracker.close();
    }

    fn failure(&self) -> Option<ProviderError> {
        self.failure.lock().clone()
    }

    fn dispatch(&self, doc_id: &str, engine: &Arc<dyn Engine>, payload: &[u8]) -> Result<()> {
        match Message::decode(payload) {
            Ok(Message::Sync(message)) => sync::handle(self, doc_id, engine, message),
            Ok(Message::Awareness(_)) => {
                debug!(doc_id = %doc_id, "Ignoring awareness message");
                Ok(())
            }
            Err(ProtocolError::UnknownMessageType(message_type)) => {
                warn!(doc_id = %doc_id, message_type, "Dropping message of unknown type");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write queued frames one at a time until the provider closes.
///
/// A write still running at cancellation is abandoned and the sink dropped
/// with it, so nothing follows a partial frame.
async fn write_loop(
    shared: Arc<Shared>,
    mut sink: Box<dyn FrameSink>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) -> Result<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            next = outbound.recv() => next,
        };
        let Some(Outbound { frame, written }) = next else {
            break;
        };

        let bytes = frame.len();
        let result = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                debug!(bytes, "Abandoning frame write");
                return Ok(());
            }
            result = sink.send_frame(frame) => result,
        };

        match result {
            Ok(()) => {
                debug!(bytes, "Frame sent");
                if let Some(written) = written {
                    let _ = written.send(Ok(()));
                }
            }
            Err(e) => {
                let e = ProviderError::from(e);
                if let Some(written) = written {
                    let _ = written.send(Err(e.clone()));
                }
                return Err(e);
            }
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to close connection"),
        Err(_) => warn!("Timed out closing connection"),
    }
    Ok(())
}

async fn receive_loop(shared: Arc<Shared>, mut frames: FrameStream) -> Result<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return Ok(()),
            next = frames.next() => next,
        };

        let data = match next {
            Some(Ok(data)) => data,
            Some(Err(e)) => return Err(e.into()),
            None => {
                info!("Connection closed by peer");
                return Err(ProviderError::Disconnected);
            }
        };

        let frame = decode_frame(&data)?;
        // frames for documents this process does not track are dropped
        let Some(engine) = shared.registry.get(frame.doc_id) else {
            debug!(doc_id = %frame.doc_id, "Dropping frame for unregistered document");
            continue;
        };
        shared.dispatch(frame.doc_id, engine, frame.message)?;
    }
}

fn initial_sweep(shared: &Shared) -> Result<()> {
    for (id, engine) in shared.registry.iter() {
        let step1 = SyncMessage::step1(engine.state_vector());
        shared.send(&step1.encode(), id.as_str())?;
    }
    debug!(documents = shared.registry.len(), "Initial sync requests queued");
    Ok(())
}

/// Synchronizes the documents of a registry over one connection
pub struct Provider {
    shared: Arc<Shared>,
    frames: Mutex<Option<FrameStream>>,
    _subscriptions: Vec<Subscription>,
}

impl Provider {
    /// Take ownership of `connection` and observe every registered document.
    ///
    /// Must be called within a tokio runtime. The writer starts right away;
    /// nothing is read before [`open`](Self::open).
    pub fn new<C: Connection>(registry: Registry, connection: C) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| ProviderError::NoRuntime)?;
        let (sink, frames) = connection.split();
        let (outbound, queue) = mpsc::unbounded_channel();

        let states = registry
            .ids()
            .map(|id| (id.clone(), SyncState::default()))
            .collect();

        let shared = Arc::new(Shared {
            registry,
            states,
            outbound,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            failure: Mutex::new(None),
            handle,
        });
        shared.spawn("write", write_loop(shared.clone(), sink, queue));

        let subscriptions = shared
            .registry
            .iter()
            .map(|(id, engine)| observer::subscribe(&shared, id, engine))
            .collect::<Result<Vec<_>>>()?;

        info!(documents = shared.registry.len(), "Provider created");

        Ok(Self {
            shared,
            frames: Mutex::new(Some(frames)),
            _subscriptions: subscriptions,
        })
    }

    /// Start the receive loop and request every document from the peer
    pub fn open(&self) -> Result<()> {
        if self.shared.is_cancelled() {
            return Err(ProviderError::Closed);
        }
        let frames = self.frames.lock().take().ok_or(ProviderError::AlreadyOpen)?;

        self.shared.spawn("receive", receive_loop(self.shared.clone(), frames));
        initial_sweep(&self.shared)?;
        info!("Provider opened");
        Ok(())
    }

    /// Send `message` to the peer, addressed to `doc_id`, and wait until
    /// the frame is written
    pub async fn send(&self, message: &[u8], doc_id: &str) -> Result<()> {
        let (written, done) = oneshot::channel();
        self.shared.enqueue(message, doc_id, Some(written))?;
        done.await.unwrap_or(Err(ProviderError::Closed))
    }

    /// Stop every task and wait for them. The writer releases the connection
    /// on its way out.
    ///
    /// Returns the error that tore the provider down, if any.
    pub async fn close(&self) -> Result<()> {
        info!("Closing provider");
        self.shared.cancel.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        self.frames.lock().take();

        match self.shared.failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolve once the provider has stopped, by error or by [`close`](Self::close)
    pub async fn wait(&self) -> Result<()> {
        self.shared.cancel.cancelled().await;
        self.shared.tracker.wait().await;

        match self.shared.failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether `doc_id` has received its STEP2; false for unknown documents
    pub fn is_synced(&self, doc_id: &str) -> bool {
        self.shared.state(doc_id).is_some_and(SyncState::is_synced)
    }

    /// Wait until `doc_id` is synced, or fail if the provider stops first
    pub async fn wait_synced(&self, doc_id: &str) -> Result<()> {
        let state = self
            .shared
            .state(doc_id)
            .ok_or_else(|| ProviderError::UnknownDocument(doc_id.to_string()))?;

        tokio::select! {
            biased;
            _ = state.wait() => Ok(()),
            _ = self.shared.cancel.cancelled() => {
                Err(self.shared.failure().unwrap_or(ProviderError::Closed))
            }
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("documents", &self.shared.registry.len())
            .field("closed", &self.shared.is_cancelled())
            .finish()
    }
}
