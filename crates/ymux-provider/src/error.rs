//! Transport and provider error types

use std::sync::Arc;
use thiserror::Error;
use ymux_protocol::ProtocolError;

/// Errors raised by a connection adapter
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Stream error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Connection closed")]
    Closed,
}

/// Result type for connection adapters
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors that tear a provider down, plus misuse of its API
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Framing error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(Arc<TransportError>),

    #[error("Engine error for document {doc_id}: {source}")]
    Engine {
        doc_id: String,
        #[source]
        source: ymux_core::Error,
    },

    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error("Connection lost")]
    Disconnected,

    #[error("Provider is closed")]
    Closed,

    #[error("Provider already opened")]
    AlreadyOpen,

    #[error("No tokio runtime available")]
    NoRuntime,
}

impl From<TransportError> for ProviderError {
    fn from(e: TransportError) -> Self {
        ProviderError::Transport(Arc::new(e))
    }
}

impl ProviderError {
    pub(crate) fn engine(doc_id: &str) -> impl FnOnce(ymux_core::Error) -> Self + '_ {
        move |source| ProviderError::Engine {
            doc_id: doc_id.to_string(),
            source,
        }
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
