//! WebSocket connections
//!
//! Each frame travels as one binary message. Text messages are ignored and
//! a close message ends the stream.

use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{stream, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// A frame connection over one WebSocket
pub struct WebSocketConnection<S> {
    inner: WebSocketStream<S>,
}

impl WebSocketConnection<MaybeTlsStream<TcpStream>> {
    /// Open a client connection to `url` (`ws://` or `wss://`)
    pub async fn connect(url: &str) -> TransportResult<Self> {
        let (inner, _response) = connect_async(url).await?;
        info!(url = %url, "WebSocket connected");
        Ok(Self { inner })
    }
}

impl WebSocketConnection<TcpStream> {
    /// Complete the server side handshake on an accepted stream
    pub async fn accept(stream: TcpStream) -> TransportResult<Self> {
        let inner = accept_async(stream).await?;
        info!("WebSocket peer connected");
        Ok(Self { inner })
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn split(self) -> (Box<dyn FrameSink>, FrameStream) {
        let (write, read) = self.inner.split();

        let frames = stream::unfold(read, |mut read| async move {
            loop {
                match read.next().await? {
                    Ok(Message::Binary(data)) => return Some((Ok(Bytes::from(data)), read)),
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket closed by peer");
                        return None;
                    }
                    Ok(Message::Text(_)) => {
                        warn!("Ignoring text WebSocket message");
                    }
                    Ok(_) => {
                        // Ping and pong are answered by tungstenite
                    }
                    Err(e) => return Some((Err(TransportError::WebSocket(e)), read)),
                }
            }
        })
        .boxed();

        (Box::new(WebSocketSink { write }), frames)
    }
}

struct WebSocketSink<S> {
    write: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&mut self, frame: Bytes) -> TransportResult<()> {
        self.write.send(Message::Binary(frame.to_vec().into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        SinkExt::close(&mut self.write).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_websocket_binary_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text("ignored".into())).await.unwrap();
            ws.send(Message::Binary(vec![1u8, 2, 3])).await.unwrap();
            let echoed = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            echoed
        });

        let (mut sink, mut frames) = WebSocketConnection::connect(&url).await.unwrap().split();
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(&[1, 2, 3]));

        sink.send_frame(Bytes::from_static(&[9])).await.unwrap();
        assert!(frames.next().await.is_none());
        assert_eq!(server.await.unwrap(), Message::Binary(vec![9u8]));
    }
}
