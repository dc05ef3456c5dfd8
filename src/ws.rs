//! WebSocket transport over `tokio-tungstenite`.
//!
//! [`connect`] performs the handshake (with optional extra headers) and
//! returns split [`WsWriter`] / [`WsReader`] halves for use in a
//! `tokio::select!` loop. [`WsWriter`] implements [`FrameSink`], so the
//! protocol core can send through it directly.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::transport::FrameSink;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Close code reported when the peer sent a close frame without one.
const NO_STATUS_CODE: u16 = 1005;

/// Inbound WebSocket message.
#[derive(Debug)]
pub enum WsMessage {
    /// Text frame; cable protocol frames arrive here.
    Text(String),
    /// Binary frame (unused by the cable protocol).
    Binary(Vec<u8>),
    /// Ping, to be answered with a pong.
    Ping(Vec<u8>),
    /// Pong.
    Pong(Vec<u8>),
    /// Peer closed the connection.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string().into()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Answer a ping.
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(data.into()))
            .await
            .context("WebSocket send_pong failed")
    }

    /// Flush and close the sink.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.context("WebSocket close failed")
    }
}

#[async_trait]
impl FrameSink for WsWriter {
    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.send_text(frame).await
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Next message, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::anyhow!("WebSocket read error: {e}"))),
            };
            let converted = match message {
                tungstenite::Message::Text(text) => WsMessage::Text(text.to_string()),
                tungstenite::Message::Binary(data) => WsMessage::Binary(data.to_vec()),
                tungstenite::Message::Ping(data) => WsMessage::Ping(data.to_vec()),
                tungstenite::Message::Pong(data) => WsMessage::Pong(data.to_vec()),
                tungstenite::Message::Close(frame) => {
                    let (code, reason) = frame.map_or((NO_STATUS_CODE, String::new()), |cf| {
                        (cf.code.into(), cf.reason.to_string())
                    });
                    WsMessage::Close { code, reason }
                }
                tungstenite::Message::Frame(_) => continue,
            };
            return Some(Ok(converted));
        }
    }
}

/// Open a WebSocket connection to `url`, adding each `(name, value)` header
/// to the handshake request.
///
/// # Errors
///
/// Returns an error for an invalid URL or header, or a failed handshake.
pub async fn connect(url: &str, headers: &[(String, String)]) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    for (name, value) in headers {
        let header_name = tungstenite::http::HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        let header_value = tungstenite::http::HeaderValue::from_str(value)
            .with_context(|| format!("invalid header value for {name}"))?;
        request.headers_mut().insert(header_name, header_value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect to {url} failed"))?;

    let (sink, stream) = ws_stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Rewrite `http://` / `https://` to `ws://` / `wss://`. WebSocket URLs pass
/// through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

/// Normalize a server URL into a cable endpoint: WebSocket scheme, and
/// `/cable` appended when the URL names no path.
#[must_use]
pub fn cable_url(url: &str) -> String {
    let ws_url = http_to_ws_scheme(url.trim_end_matches('/'));
    let has_path = ws_url
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/'));
    if has_path {
        ws_url
    } else {
        format!("{ws_url}/cable")
    }
}
