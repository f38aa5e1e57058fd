//! The collaboration channel capability and its in-process loopback.
//!
//! Every transport delivers [`ActivityEvent`]s to whoever is subscribed at
//! the moment of delivery. Delivery is at-most-once per subscriber with no
//! acknowledgement, retry or replay: a subscriber that joins after an event
//! was delivered never sees it.

use std::sync::OnceLock;
use std::time::Duration;

use planboard_core::collaboration::{ActivityEvent, ActivityKind, LOOPBACK_DELAY_MS};
use planboard_core::identity::Participant;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Publish/subscribe capability shared by the loopback and socket transports.
///
/// Implementations are shared as `Arc<dyn Channel>` and chosen once, by
/// configuration, in the session's composition root.
pub trait Channel: Send + Sync {
    /// Deliver `event` to every current subscriber.
    fn publish(&self, event: ActivityEvent);

    /// Register a new subscriber. Dropping the [`Subscription`] unsubscribes.
    fn subscribe(&self) -> Subscription;

    /// Announce that `user` has joined.
    ///
    /// Transports with their own handshake may override this.
    fn join(&self, user: &Participant) {
        self.publish(ActivityEvent::new(ActivityKind::UserConnected, user));
    }

    /// Announce that `user` is leaving.
    fn leave(&self, user: &Participant) {
        self.publish(ActivityEvent::new(ActivityKind::UserDisconnected, user));
    }
}

/// Receiving half of a channel registration.
pub struct Subscription {
    receiver: broadcast::Receiver<ActivityEvent>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<ActivityEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event. Returns `None` once the channel is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ActivityEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged, some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ActivityEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged, some events were dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LoopbackChannel
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process channel that echoes every published event back to all local
/// subscribers after a short artificial delay.
///
/// Stands in for a real socket in tests and single-user demos.
///
/// Delayed events go through a single delivery task, so they arrive in
/// publish order.
pub struct LoopbackChannel {
    sender: broadcast::Sender<ActivityEvent>,
    delay: Duration,
    /// Queue of the delivery task, started on the first delayed publish.
    pending: OnceLock<mpsc::UnboundedSender<(Instant, ActivityEvent)>>,
}

impl LoopbackChannel {
    /// Create a loopback with a specific delivery delay.
    pub fn new(delay: Duration) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            sender,
            delay,
            pending: OnceLock::new(),
        }
    }

    /// A loopback that delivers synchronously inside `publish`.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new(Duration::from_millis(LOOPBACK_DELAY_MS))
    }
}

impl Channel for LoopbackChannel {
    /// Delivery happens on the delivery task after the configured delay. With
    /// a zero delay, or outside a Tokio runtime, it happens immediately.
    fn publish(&self, event: ActivityEvent) {
        tracing::trace!(kind = event.kind_name(), user_id = %event.user_id, "Publishing on loopback");

        let runtime = tokio::runtime::Handle::try_current();
        let event = match runtime {
            Ok(handle) if !self.delay.is_zero() => {
                let queue = self
                    .pending
                    .get_or_init(|| spawn_delivery(&handle, self.sender.clone()));
                match queue.send((Instant::now() + self.delay, event)) {
                    Ok(()) => return,
                    // The delivery task died with the runtime that started it.
                    Err(mpsc::error::SendError((_, event))) => {
                        tracing::warn!("Loopback delivery task is gone, delivering immediately");
                        event
                    }
                }
            }
            _ => event,
        };
        // Zero receivers is not an error for a broadcast.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }
}

/// Deliver queued events in order, each at its due time. Ends once the
/// channel is dropped and the queue is drained.
fn spawn_delivery(
    handle: &tokio::runtime::Handle,
    sender: broadcast::Sender<ActivityEvent>,
) -> mpsc::UnboundedSender<(Instant, ActivityEvent)> {
    let (queue, mut pending) = mpsc::unbounded_channel::<(Instant, ActivityEvent)>();
    handle.spawn(async move {
        while let Some((due, event)) = pending.recv().await {
            tokio::time::sleep_until(due).await;
            let _ = sender.send(event);
        }
        tracing::trace!("Loopback delivery task stopped");
    });
    queue
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
