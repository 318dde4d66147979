//! ymux Provider
//!
//! Keeps several documents synchronized with a peer over one connection:
//! - Provider: routes frames by document ID and runs the sync handshake
//! - Connections: in-memory pairs, TCP, WebSocket
//!
//! ```no_run
//! use std::sync::Arc;
//! use ymux_core::{ContentKind, Document, DocumentId, Registry};
//! use ymux_provider::{Provider, TcpConnection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let notes = Arc::new(Document::new(ContentKind::Text));
//! let registry = Registry::new().with(DocumentId::new("notes")?, notes.clone())?;
//!
//! let connection = TcpConnection::connect("127.0.0.1:7700").await?;
//! let provider = Provider::new(registry, connection)?;
//! provider.open()?;
//! provider.wait_synced("notes").await?;
//! println!("{}", notes.text()?);
//! provider.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod memory;
mod observer;
pub mod provider;
mod sync;
#[cfg(feature = "tcp")]
pub mod tcp;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use connection::{Connection, FrameSink, FrameStream};
pub use error::{ProviderError, Result, TransportError, TransportResult};
pub use memory::MemoryConnection;
pub use provider::Provider;
#[cfg(feature = "tcp")]
pub use tcp::TcpConnection;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
