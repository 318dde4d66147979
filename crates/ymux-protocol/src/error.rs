//! Protocol error types

use thiserror::Error;

/// Protocol-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("Variable-length integer overflows 64 bits")]
    VarintOverflow,

    #[error("Document ID length {len} exceeds remaining {remaining} bytes")]
    IdTooLong { len: u64, remaining: usize },

    #[error("Document ID is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame carries no message")]
    EmptyMessage,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Unknown sync message type: {0}")]
    UnknownSyncType(u8),

    #[error("Payload length {len} exceeds remaining {remaining} bytes")]
    PayloadTruncated { len: u64, remaining: usize },

    #[error("Frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
