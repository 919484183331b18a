//! WebSocket client for the twentydepth feed
//!
//! Thin wrapper over the socket stream: connect, receive, send control
//! frames. Lifecycle decisions live in the session machine, not here.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::error::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound unit from the feed socket.
#[derive(Debug)]
pub enum FeedMessage {
    /// Binary depth payload (one or two 332-byte frames).
    Binary(Vec<u8>),
    /// Text frame, typically a server acknowledgement.
    Text(String),
    /// Keep-alive ping or pong.
    Ping,
    /// The peer closed the connection (or the stream ended).
    Closed { code: Option<u16> },
}

/// WebSocket client for a single feed connection
pub struct FeedSocket {
    stream: Option<WsStream>,
}

impl FeedSocket {
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Connect to the feed endpoint.
    pub async fn connect(&mut self, url: &str) -> Result<()> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| FeedError::Socket(format!("failed to connect: {e}")))?;

        debug!(status = ?response.status(), "websocket handshake complete");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next inbound message.
    ///
    /// Transport errors tear the stream down and are returned to the
    /// caller; the caller decides how the close is surfaced.
    pub async fn recv(&mut self) -> Result<FeedMessage> {
        let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "received binary frame");
                    return Ok(FeedMessage::Binary(data));
                }
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "received text frame");
                    return Ok(FeedMessage::Text(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = stream.send(Message::Pong(data)).await;
                    return Ok(FeedMessage::Ping);
                }
                Some(Ok(Message::Pong(_))) => {
                    return Ok(FeedMessage::Ping);
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    warn!(code = ?code, "received close frame");
                    self.stream = None;
                    return Ok(FeedMessage::Closed { code });
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(FeedError::Socket(e.to_string()));
                }
                None => {
                    warn!("websocket stream ended");
                    self.stream = None;
                    return Ok(FeedMessage::Closed { code: None });
                }
            }
        }
    }

    /// Send a JSON control message as a text frame.
    pub async fn send_control<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;
        let text = serde_json::to_string(message)?;
        debug!(%text, "sending control message");
        stream
            .send(Message::Text(text))
            .await
            .map_err(|e| FeedError::Socket(e.to_string()))
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}

impl Default for FeedSocket {
    fn default() -> Self {
        Self::new()
    }
}
