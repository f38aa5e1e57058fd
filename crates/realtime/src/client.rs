//! WebSocket client for the collaboration relay.
//!
//! [`RealtimeClient`] holds the relay URL. Call
//! [`RealtimeClient::connect`] to open a live [`RealtimeConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connection settings for one relay endpoint.
pub struct RealtimeClient {
    ws_url: String,
}

/// A live WebSocket connection to the relay.
pub struct RealtimeConnection {
    /// Identifier sent during the handshake so the relay can tell
    /// connections from the same user apart.
    pub connection_id: String,
    pub ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl RealtimeClient {
    /// * `ws_url` - full relay endpoint, e.g. `ws://host:3001/ws`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the WebSocket.
    ///
    /// A fresh connection id (UUID v4) is appended as the `connectionId`
    /// query parameter.
    pub async fn connect(&self) -> Result<RealtimeConnection, RealtimeClientError> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let separator = if self.ws_url.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}connectionId={connection_id}", self.ws_url);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            RealtimeClientError::Connection(format!(
                "Failed to connect to relay at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(connection_id = %connection_id, "Connected to relay at {}", self.ws_url);

        Ok(RealtimeConnection {
            connection_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the socket client.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
