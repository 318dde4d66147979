//! Error types for ymux Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Invalid document ID: {0}")]
    InvalidDocumentId(String),

    #[error("Document already exists: {0}")]
    DocumentExists(String),

    #[error("Content kind mismatch: expected {expected}, got {got}")]
    KindMismatch { expected: String, got: String },

    #[error("Invalid content kind: {0}")]
    InvalidKind(String),

    #[error("CRDT error: {0}")]
    Crdt(String),

    #[error("Failed to subscribe to document changes: {0}")]
    Subscribe(String),
}

/// Result type alias for ymux Core operations
pub type Result<T> = std::result::Result<T, Error>;
