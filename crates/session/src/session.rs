//! The collaboration session: one per signed-in user.
//!
//! [`CollabSession`] is the composition root. It owns the channel, the
//! field-lock tracker, the activity feed, the viewer roster and the
//! edit-history ledger, and runs two background tasks: the fold task that
//! applies incoming channel events to the shared state, and the ledger's
//! polling refresh. Both stop on [`shutdown`](CollabSession::shutdown).

use std::sync::Arc;
use std::time::{Duration, Instant};

use planboard_core::activity::{ActivityFeed, ToastNotifier};
use planboard_core::collaboration::{ActivityEvent, ActivityKind};
use planboard_core::field_lock::{FieldLock, FieldLockTracker};
use planboard_core::history::{EditHistoryEntry, FieldEdit};
use planboard_core::identity::{Participant, SessionUser};
use planboard_core::viewers::TabViewerRoster;
use planboard_events::{Channel, LoopbackChannel, Subscription, ViewerPresence};
use planboard_realtime::{ConnectionManager, RealtimeClient};
use planboard_sheets::{DurableStore, FileStore, LocalStore, SheetsHistoryStore, SheetsProxyClient};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ChannelKind, SessionConfig};
use crate::ledger::EditHistoryLedger;

/// How long shutdown waits for background tasks.
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The channel a session publishes on, plus whatever owns its lifecycle.
#[derive(Clone)]
pub struct Transport {
    channel: Arc<dyn Channel>,
    socket: Option<Arc<ConnectionManager>>,
}

impl Transport {
    pub fn loopback(channel: Arc<LoopbackChannel>) -> Self {
        Self {
            channel,
            socket: None,
        }
    }

    pub fn socket(manager: Arc<ConnectionManager>) -> Self {
        Self {
            channel: manager.clone(),
            socket: Some(manager),
        }
    }

    /// Any other [`Channel`] whose lifecycle the caller manages.
    pub fn shared(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            socket: None,
        }
    }

    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.channel)
    }

    async fn close(&self) {
        if let Some(socket) = &self.socket {
            socket.shutdown().await;
        }
    }
}

/// Resolve the configured [`ChannelKind`] into a transport.
///
/// The socket variant starts connecting immediately and must be created
/// inside a Tokio runtime.
pub fn build_channel(config: &SessionConfig, local: &Participant) -> Transport {
    match config.channel {
        ChannelKind::Loopback => {
            tracing::info!(delay_ms = config.loopback_delay.as_millis() as u64, "Using loopback channel");
            Transport::loopback(Arc::new(LoopbackChannel::new(config.loopback_delay)))
        }
        ChannelKind::Socket => {
            tracing::info!(url = %config.ws_url, "Using socket channel");
            Transport::socket(ConnectionManager::start(
                RealtimeClient::new(config.ws_url.clone()),
                local.clone(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Session parts
// ---------------------------------------------------------------------------

/// Everything a session is assembled from.
pub struct SessionParts {
    pub transport: Transport,
    pub durable: Arc<dyn DurableStore>,
    pub local: Arc<dyn LocalStore>,
    pub feed_capacity: usize,
    pub poll_interval: Duration,
}

impl SessionParts {
    /// Production wiring: configured channel, proxy-backed durable store,
    /// file-backed local mirror.
    pub fn from_config(config: &SessionConfig, user: &SessionUser) -> Self {
        let durable = SheetsHistoryStore::new(
            SheetsProxyClient::new(config.proxy_url.clone()),
            config.history_sheet.clone(),
        );
        Self {
            transport: build_channel(config, &user.participant()),
            durable: Arc::new(durable),
            local: Arc::new(FileStore::new(config.local_store_dir.clone())),
            feed_capacity: config.feed_capacity,
            poll_interval: config.poll_interval,
        }
    }
}

// ---------------------------------------------------------------------------
// CollabSession
// ---------------------------------------------------------------------------

/// State folded from channel events.
#[derive(Debug)]
struct SharedState {
    locks: FieldLockTracker,
    feed: ActivityFeed,
    roster: TabViewerRoster,
    toast: ToastNotifier,
}

pub struct CollabSession {
    user: SessionUser,
    me: Participant,
    transport: Transport,
    presence: ViewerPresence,
    state: Arc<RwLock<SharedState>>,
    ledger: Arc<EditHistoryLedger>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CollabSession {
    /// Subscribe, announce the user, load the ledger and start polling.
    pub async fn start(parts: SessionParts, user: SessionUser) -> Arc<Self> {
        let me = user.participant();
        let channel = parts.transport.channel();
        let cancel = CancellationToken::new();

        let state = Arc::new(RwLock::new(SharedState {
            locks: FieldLockTracker::new(),
            feed: ActivityFeed::with_capacity(parts.feed_capacity),
            roster: TabViewerRoster::new(),
            toast: ToastNotifier::default(),
        }));

        // Subscribe before announcing so the session sees its own join.
        let fold = tokio::spawn(fold_events(
            channel.subscribe(),
            Arc::clone(&state),
            me.user_id.clone(),
            cancel.clone(),
        ));

        channel.join(&me);
        tracing::info!(user_id = %me.user_id, "Collaboration session started");

        let ledger = Arc::new(EditHistoryLedger::new(parts.durable, parts.local));
        ledger.load().await;
        let polling = ledger.spawn_polling(parts.poll_interval, cancel.child_token());

        Arc::new(Self {
            user,
            presence: ViewerPresence::new(channel),
            me,
            transport: parts.transport,
            state,
            ledger,
            cancel,
            tasks: Mutex::new(vec![fold, polling]),
        })
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn participant(&self) -> &Participant {
        &self.me
    }

    pub fn ledger(&self) -> &Arc<EditHistoryLedger> {
        &self.ledger
    }

    // ---- editing ----

    /// Try to open `field_id` for editing.
    ///
    /// Returns `false`, with nothing published, when another collaborator
    /// holds the field.
    pub async fn begin_edit(&self, field_id: &str) -> bool {
        let acquired = self.state.write().await.locks.acquire(field_id, &self.me);
        if !acquired {
            tracing::debug!(field_id, user_id = %self.me.user_id, "Field is being edited by someone else");
            return false;
        }

        tracing::debug!(field_id, user_id = %self.me.user_id, "Lock acquired");
        self.publish(ActivityKind::FieldEditStart {
            field_id: field_id.to_string(),
        });
        true
    }

    /// Close `field_id` without saving.
    pub async fn cancel_edit(&self, field_id: &str) {
        self.release(field_id).await;
    }

    /// Save a field: record it in the ledger, release the lock and tell
    /// everyone the new value.
    pub async fn save_field(&self, edit: FieldEdit) -> Option<EditHistoryEntry> {
        let field_id = edit.field_id.clone();
        let new_value = edit.new_value.clone();
        let explicit_section = edit.section.clone();

        let entry = self.ledger.append(edit, Some(&self.user)).await;
        self.release(&field_id).await;

        let mut event = ActivityEvent::field_updated(field_id, new_value, &self.me);
        if let (Some(explicit), ActivityKind::FieldUpdated { section, .. }) =
            (explicit_section, &mut event.kind)
        {
            *section = explicit;
        }
        self.transport.channel.publish(event);
        entry
    }

    async fn release(&self, field_id: &str) {
        let released = self.state.write().await.locks.release(field_id, &self.me.user_id);
        if released {
            tracing::debug!(field_id, user_id = %self.me.user_id, "Lock released");
            self.publish(ActivityKind::FieldEditComplete {
                field_id: field_id.to_string(),
            });
        }
    }

    // ---- presence ----

    pub fn view_tab(&self, tab: &str) {
        self.presence.announce(tab, &self.me);
    }

    pub fn leave_tab(&self, tab: &str) {
        self.presence.withdraw(tab, &self.me);
    }

    // ---- read models ----

    /// Who is editing `field_id`, if anyone.
    pub async fn lock_holder(&self, field_id: &str) -> Option<Participant> {
        self.state.read().await.locks.query(field_id).cloned()
    }

    /// Whether someone other than the local user is editing `field_id`.
    pub async fn is_blocked(&self, field_id: &str) -> bool {
        self.state.read().await.locks.is_blocked_for(field_id, &self.me.user_id)
    }

    pub async fn locks(&self) -> Vec<FieldLock> {
        self.state.read().await.locks.locks()
    }

    /// Recent activity, newest first.
    pub async fn recent_activity(&self) -> Vec<ActivityEvent> {
        self.state.read().await.feed.events()
    }

    /// Everyone viewing `tab`, the local user included.
    pub async fn viewers(&self, tab: &str) -> Vec<Participant> {
        self.state.read().await.roster.viewers(tab).to_vec()
    }

    /// Viewers of `tab` other than the local user.
    pub async fn other_viewers(&self, tab: &str) -> Vec<Participant> {
        let state = self.state.read().await;
        state.roster.others(tab, &self.me.user_id).into_iter().cloned().collect()
    }

    /// The update toast to show at `now`, if any.
    pub async fn toast(&self, now: Instant) -> Option<ActivityEvent> {
        let mut state = self.state.write().await;
        let SharedState { feed, toast, .. } = &mut *state;
        toast.poll(feed, &self.me.user_id, now).map(|entry| entry.event.clone())
    }

    pub async fn dismiss_toast(&self) {
        self.state.write().await.toast.dismiss();
    }

    pub async fn history(&self) -> Vec<EditHistoryEntry> {
        self.ledger.entries().await
    }

    // ---- lifecycle ----

    /// Announce the departure, stop background tasks and close the transport.
    pub async fn shutdown(&self) {
        self.transport.channel.leave(&self.me);
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(TASK_SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!("Session task did not stop in time");
            }
        }

        self.transport.close().await;
        tracing::info!(user_id = %self.me.user_id, "Collaboration session stopped");
    }

    fn publish(&self, kind: ActivityKind) {
        self.transport.channel.publish(ActivityEvent::new(kind, &self.me));
    }
}

/// Apply channel events to the shared state until cancelled or the channel
/// closes.
///
/// Lock events authored locally are skipped: the local tracker is already
/// authoritative for them, and an echo arriving out of order must not
/// resurrect a released lock.
async fn fold_events(
    mut subscription: Subscription,
    state: Arc<RwLock<SharedState>>,
    local_user_id: String,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut state = state.write().await;
        if ActivityFeed::accepts(&event) {
            tracing::trace!(kind = event.kind_name(), user_id = %event.user_id, "Activity recorded");
            state.feed.record(event);
            continue;
        }

        match &event.kind {
            ActivityKind::FieldEditStart { field_id } if event.user_id != local_user_id => {
                if !state.locks.acquire(field_id, &event.author()) {
                    tracing::debug!(field_id = %field_id, user_id = %event.user_id, "Conflicting remote edit start ignored");
                }
            }
            ActivityKind::FieldEditComplete { field_id } if event.user_id != local_user_id => {
                state.locks.release(field_id, &event.user_id);
            }
            ActivityKind::TabViewStart { .. } | ActivityKind::TabViewEnd { .. } => {
                state.roster.apply(&event);
            }
            _ => {}
        }
    }
    tracing::debug!("Session fold task stopped");
}
