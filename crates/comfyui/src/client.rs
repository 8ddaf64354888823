//! WebSocket subscription to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the WebSocket base URL. Each generation run
//! opens its own [`ComfyUIConnection`] with a fresh client id so ComfyUI
//! only addresses that run's events to it.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Configuration handle for a ComfyUI WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct ComfyUIClient {
    ws_url: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Client ID sent during the WebSocket handshake.
    pub client_id: String,
    ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Derive the WebSocket base URL from an HTTP API URL.
///
/// `http://host:8188` becomes `ws://host:8188`; `https` becomes `wss`.
pub fn ws_url_from_api(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    }
}

impl ComfyUIClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String) -> Self {
        Self {
            ws_url: ws_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to `{ws_url}/ws?clientId={client_id}`.
    pub async fn connect(&self, client_id: &str) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::debug!(client_id = %client_id, "Subscribed to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}

impl ComfyUIConnection {
    /// Next text frame, or `None` once the stream is closed or broken.
    ///
    /// Binary frames (preview images) and control frames are skipped.
    pub async fn next_text(&mut self) -> Option<String> {
        while let Some(msg_result) = self.ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Binary(_)) => {
                    tracing::trace!(client_id = %self.client_id, "Ignoring binary message (preview image)");
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    tracing::debug!(client_id = %self.client_id, ?frame, "ComfyUI WebSocket closed");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(client_id = %self.client_id, error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
        None
    }

    /// Close the subscription. Errors are logged, never returned.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.send(Message::Close(None)).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        }
    }
}
