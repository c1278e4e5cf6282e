//! WebSocket transport for the RTM stream.
//!
//! Thin wrapper around `tokio-tungstenite` returning split reader/writer
//! halves. Protocol-level pings are answered by tungstenite itself while
//! reading; RTM keepalive pings are sent through [`WsWriter::send_text`].

use crate::error::{Result, SlackvError};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Received WebSocket message
#[derive(Debug)]
pub enum WsMessage {
    /// UTF-8 text frame, one RTM event
    Text(String),
    /// Close frame with status code and reason
    Close { code: u16, reason: String },
    /// Binary, ping or pong frame; only proves the connection is alive
    Other,
}

pub struct WsWriter {
    sink: SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|e| SlackvError::WebSocket(format!("send failed: {}", e)))
    }

    /// Send a close frame and flush the sink
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| SlackvError::WebSocket(format!("close failed: {}", e)))
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, returning `None` when the stream ends
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => {
                    return Some(Err(SlackvError::WebSocket(format!("read failed: {}", e))));
                }
            };

            let message = match message {
                tungstenite::Message::Text(text) => WsMessage::Text(text.to_string()),
                tungstenite::Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    WsMessage::Close { code, reason }
                }
                tungstenite::Message::Frame(_) => continue,
                _ => WsMessage::Other,
            };
            return Some(Ok(message));
        }
    }
}

/// Open a WebSocket connection, failing with `Timeout` after `timeout`
pub async fn connect(url: &str, timeout: Duration) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| SlackvError::Timeout("WebSocket handshake".to_string()))?
        .map_err(|e| SlackvError::WebSocket(format!("connect failed: {}", e)))?;

    let (sink, stream) = ws_stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}
