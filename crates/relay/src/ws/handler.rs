use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use planboard_core::collaboration::{parse_message, ActivityKind};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::manager::WsManager;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    /// Client-chosen id; a fresh UUID is used when absent.
    connection_id: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// served by a sender task plus the receive loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let conn_id = params
        .connection_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, conn_id, state.ws_manager))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Relays inbound activity frames to every connection.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, conn_id: String, ws_manager: Arc<WsManager>) {
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => relay_text(&ws_manager, &conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Validate one inbound frame and fan it out to every connection, the
/// sender included. Keep-alives and undecodable frames go nowhere.
async fn relay_text(ws_manager: &WsManager, conn_id: &str, text: &str) {
    match parse_message(text) {
        Ok(event) if event.kind == ActivityKind::Ping => {
            tracing::trace!(conn_id, "Client ping");
        }
        Ok(event) => {
            ws_manager.identify(conn_id, &event.user_id).await;
            tracing::debug!(conn_id, kind = event.kind_name(), user_id = %event.user_id, "Relaying event");
            ws_manager.broadcast(Message::Text(text.to_owned().into())).await;
        }
        Err(e) => {
            tracing::warn!(conn_id, error = %e, "Dropping undecodable frame");
        }
    }
}
