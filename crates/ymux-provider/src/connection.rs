//! Connection collaborator traits
//!
//! A connection is split once into a sink that writes whole frames and a
//! stream of received frames. The stream ends when the peer disconnects.

use crate::error::TransportResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Received frames, in arrival order
pub type FrameStream = BoxStream<'static, TransportResult<Bytes>>;

/// Writing half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame. Either the whole frame is written or an error is returned.
    async fn send_frame(&mut self, frame: Bytes) -> TransportResult<()>;

    /// Release the connection; the peer's stream ends
    async fn close(&mut self) -> TransportResult<()>;
}

/// A bidirectional frame connection
pub trait Connection: Send {
    fn split(self) -> (Box<dyn FrameSink>, FrameStream);
}
