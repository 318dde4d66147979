//! In-process connections

use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;

/// One end of an in-process connection.
///
/// Can be handed to a provider, or driven by hand with [`send`](Self::send)
/// and [`recv`](Self::recv).
#[derive(Debug)]
pub struct MemoryConnection {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Two connected ends
pub fn pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemoryConnection { tx: a_tx, rx: a_rx },
        MemoryConnection { tx: b_tx, rx: b_rx },
    )
}

impl MemoryConnection {
    pub fn send(&self, frame: impl Into<Bytes>) -> TransportResult<()> {
        self.tx.send(frame.into()).map_err(|_| TransportError::Closed)
    }

    /// Next frame from the other end, `None` once it has closed
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Connection for MemoryConnection {
    fn split(self) -> (Box<dyn FrameSink>, FrameStream) {
        let sink = MemorySink { tx: Some(self.tx) };
        let frames = stream::unfold(self.rx, |mut rx| async move {
            let frame = rx.recv().await?;
            Some((Ok(frame), rx))
        })
        .boxed();
        (Box::new(sink), frames)
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_frame(&mut self, frame: Bytes) -> TransportResult<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, mut b) = pair();
        let (mut sink, _frames) = a.split();

        sink.send_frame(Bytes::from_static(b"one")).await.unwrap();
        sink.send_frame(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), "one");
        assert_eq!(b.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = pair();
        let (mut sink, _) = a.split();
        let (_, mut frames) = b.split();

        sink.send_frame(Bytes::from_static(b"last")).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(frames.next().await.unwrap().unwrap(), "last");
        assert!(frames.next().await.is_none());
        assert!(matches!(
            sink.send_frame(Bytes::new()).await,
            Err(TransportError::Closed)
        ));
    }
}
