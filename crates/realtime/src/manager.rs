//! Owned lifecycle for the socket transport.
//!
//! [`ConnectionManager`] keeps one persistent WebSocket to the relay. It is
//! created once by the session's composition root, spawns a connection task
//! (connect -> announce -> pump frames -> reconnect), and tears it down on
//! [`shutdown`](ConnectionManager::shutdown). Nothing about the connection
//! lives in globals.
//!
//! Received frames are decoded into [`ActivityEvent`]s at this boundary and
//! fanned out through a [`tokio::sync::broadcast`] channel; call
//! [`Channel::subscribe`] to receive them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use planboard_core::collaboration::{
    encode_message, parse_message, ActivityEvent, ActivityKind, HEARTBEAT_INTERVAL_SECS,
};
use planboard_core::identity::Participant;
use planboard_events::{Channel, Subscription};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{RealtimeClient, RealtimeClientError, RealtimeConnection};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for decoded inbound events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`ConnectionManager::shutdown`] waits for the task to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Socket-backed [`Channel`].
///
/// Publishing while the socket is down drops the event with a warning;
/// nothing is queued for later delivery.
pub struct ConnectionManager {
    local: Participant,
    outbound: mpsc::UnboundedSender<String>,
    inbound: broadcast::Sender<ActivityEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Start connecting to the relay with default backoff and heartbeat.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(client: RealtimeClient, local: Participant) -> Arc<Self> {
        Self::start_with(
            client,
            local,
            ReconnectConfig::default(),
            Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
        )
    }

    /// Start with explicit reconnect and heartbeat settings.
    pub fn start_with(
        client: RealtimeClient,
        local: Participant,
        reconnect: ReconnectConfig,
        heartbeat: Duration,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let link = Link {
            client,
            local: local.clone(),
            inbound: inbound.clone(),
            connected: Arc::clone(&connected),
            cancel: cancel.clone(),
            reconnect,
            heartbeat,
        };

        let task = tokio::spawn(async move {
            tracing::info!(url = link.client.ws_url(), "Starting relay connection task");
            link.run(outbound_rx).await;
            tracing::info!("Relay connection task exited");
        });

        Arc::new(Self {
            local,
            outbound,
            inbound,
            connected,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the socket and stop reconnecting.
    ///
    /// Waits up to five seconds for the connection task to exit.
    pub async fn shutdown(&self) {
        tracing::info!(user_id = %self.local.user_id, "Shutting down relay connection");
        self.cancel.cancel();

        if let Some(handle) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
    }
}

impl Channel for ConnectionManager {
    fn publish(&self, event: ActivityEvent) {
        if !self.is_connected() {
            tracing::warn!(kind = event.kind_name(), "Relay not connected, dropping event");
            return;
        }
        match encode_message(&event) {
            Ok(frame) => {
                let _ = self.outbound.send(frame);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode activity event"),
        }
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.inbound.subscribe())
    }

    /// The connection task announces the local user on every (re)connect,
    /// so there is nothing to send here.
    fn join(&self, user: &Participant) {
        tracing::trace!(user_id = %user.user_id, "Join is announced by the socket handshake");
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// State owned by the spawned connection task.
struct Link {
    client: RealtimeClient,
    local: Participant,
    inbound: broadcast::Sender<ActivityEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    reconnect: ReconnectConfig,
    heartbeat: Duration,
}

impl Link {
    /// Connect, pump frames until the socket drops, reconnect. Runs until
    /// the cancellation token fires.
    async fn run(&self, mut outbound_rx: mpsc::UnboundedReceiver<String>) {
        let mut pending: Option<RealtimeConnection> = None;

        loop {
            let conn = match pending.take() {
                Some(conn) => conn,
                None => {
                    let attempt = tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        result = self.client.connect() => result,
                    };
                    match attempt {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
                            match reconnect_loop(&self.client, &self.reconnect, &self.cancel).await {
                                Some(conn) => conn,
                                None => return,
                            }
                        }
                    }
                }
            };

            let connection_id = conn.connection_id.clone();
            self.connected.store(true, Ordering::SeqCst);
            let outcome = self.pump(conn, &mut outbound_rx).await;
            self.connected.store(false, Ordering::SeqCst);

            match outcome {
                Ok(()) => tracing::info!(connection_id = %connection_id, "Relay connection closed"),
                Err(e) => tracing::warn!(connection_id = %connection_id, error = %e, "Relay connection failed"),
            }

            if self.cancel.is_cancelled() {
                return;
            }

            tracing::info!("Connection lost, entering reconnect loop");
            match reconnect_loop(&self.client, &self.reconnect, &self.cancel).await {
                Some(conn) => pending = Some(conn),
                None => return,
            }
        }
    }

    /// Drive one open connection: announce, forward outbound frames, send
    /// heartbeats and decode inbound frames.
    async fn pump(
        &self,
        conn: RealtimeConnection,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<(), RealtimeClientError> {
        let (mut sink, mut stream) = conn.ws_stream.split();

        self.send_event(&mut sink, ActivityKind::UserConnected).await?;

        let first_beat = tokio::time::Instant::now() + self.heartbeat;
        let mut heartbeat = tokio::time::interval_at(first_beat, self.heartbeat);

        loop {
            tokio::select! {
                // Flush queued frames (a final USER_DISCONNECTED) before closing.
                biased;

                frame = outbound_rx.recv() => match frame {
                    Some(text) => sink
                        .send(Message::Text(text))
                        .await
                        .map_err(|e| RealtimeClientError::Protocol(e.to_string()))?,
                    None => return Ok(()),
                },
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    tracing::trace!("Relay heartbeat ping");
                    self.send_event(&mut sink, ActivityKind::Ping).await?;
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    // Control frames are answered by tungstenite itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(RealtimeClientError::Protocol(e.to_string())),
                },
            }
        }
    }

    async fn send_event<S>(&self, sink: &mut S, kind: ActivityKind) -> Result<(), RealtimeClientError>
    where
        S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let frame = encode_message(&ActivityEvent::new(kind, &self.local))
            .map_err(|e| RealtimeClientError::Protocol(e.to_string()))?;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| RealtimeClientError::Protocol(e.to_string()))
    }

    /// Decode one inbound frame and fan it out. Keep-alives and malformed
    /// frames stop here.
    fn dispatch(&self, text: &str) {
        match parse_message(text) {
            Ok(event) if event.kind == ActivityKind::Ping => {
                tracing::trace!(user_id = %event.user_id, "Ping received");
            }
            Ok(event) => {
                tracing::debug!(kind = event.kind_name(), user_id = %event.user_id, "Relay event received");
                let _ = self.inbound.send(event);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable relay frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_manager() -> Arc<ConnectionManager> {
        ConnectionManager::start_with(
            RealtimeClient::new("ws://127.0.0.1:9/ws"),
            Participant::new("me", "Me"),
            ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_dropped() {
        let manager = unreachable_manager();
        let mut sub = manager.subscribe();

        assert!(!manager.is_connected());
        manager.publish(ActivityEvent::new(ActivityKind::UserConnected, &Participant::new("me", "Me")));
        assert!(sub.try_recv().is_none());

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_reconnecting() {
        let manager = unreachable_manager();
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.shutdown().await;
        assert!(manager.task.lock().await.is_none());
        assert!(!manager.is_connected());
    }
}
