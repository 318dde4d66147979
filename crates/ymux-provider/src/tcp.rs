//! TCP connections
//!
//! TCP has no message boundaries, so every frame is prefixed with its
//! length as a variable-length integer.

use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{info, warn};
use ymux_protocol::decoder::encode_delimited;
use ymux_protocol::FrameDecoder;

/// A frame connection over one TCP stream
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Connect to a listening peer
    pub async fn connect(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(peer = %stream.peer_addr()?, "Connected");
        Ok(Self::new(stream))
    }

    /// Wait for one peer on `listener`
    pub async fn accept(listener: &TcpListener) -> TransportResult<Self> {
        let (stream, peer_addr) = listener.accept().await?;
        stream.set_nodelay(true)?;
        info!(peer = %peer_addr, "Peer connected");
        Ok(Self::new(stream))
    }

    pub fn peer_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

impl Connection for TcpConnection {
    fn split(self) -> (Box<dyn FrameSink>, FrameStream) {
        let (read, write) = self.stream.into_split();
        (Box::new(TcpSink { write }), frames(read))
    }
}

struct TcpSink {
    write: OwnedWriteHalf,
}

#[async_trait]
impl FrameSink for TcpSink {
    async fn send_frame(&mut self, frame: Bytes) -> TransportResult<()> {
        self.write.write_all(&encode_delimited(&frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.write.shutdown().await?;
        Ok(())
    }
}

fn frames(read: OwnedReadHalf) -> FrameStream {
    let state = (read, FrameDecoder::new(), vec![0u8; 8192]);

    stream::unfold(Some(state), |state| async move {
        let (mut read, mut decoder, mut buf) = state?;
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => return Some((Ok(frame), Some((read, decoder, buf)))),
                Ok(None) => {}
                Err(e) => return Some((Err(TransportError::Protocol(e)), None)),
            }

            match read.read(&mut buf).await {
                Ok(0) => {
                    if decoder.buffered() > 0 {
                        warn!(bytes = decoder.buffered(), "Connection closed mid-frame");
                    }
                    return None;
                }
                Ok(n) => decoder.feed(&buf[..n]),
                Err(e) => return Some((Err(TransportError::Io(e)), None)),
            }
        }
    })
    .boxed()
}
