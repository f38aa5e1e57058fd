use std::sync::Arc;
use std::time::Duration;

use planboard_core::collaboration::HEARTBEAT_INTERVAL_SECS;

use crate::ws::manager::WsManager;

/// Spawn a background task that sends a Ping frame to every connection
/// every 30 seconds.
///
/// The task runs until aborted through the returned handle.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }
    })
}
