//! Bounded most-recent-first activity feed and the update toast.
//!
//! The feed drives the recent-activity panel. It is in-memory only and
//! starts empty for every session.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::collaboration::{ActivityEvent, ActivityKind, ACTIVITY_FEED_CAPACITY, TOAST_DISPLAY_SECS};

/// One recorded event with a feed-local sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Monotonically increasing per feed; later entries have larger values.
    pub seq: u64,
    pub event: ActivityEvent,
}

/// Ring buffer of the most recent activity, newest first.
#[derive(Debug)]
pub struct ActivityFeed {
    capacity: usize,
    entries: VecDeque<FeedEntry>,
    next_seq: u64,
    /// Entries with `seq <= seen_through` have already been surfaced.
    seen_through: u64,
}

impl ActivityFeed {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            next_seq: 1,
            seen_through: 0,
        }
    }

    /// Whether an event belongs in the recent-activity panel.
    ///
    /// Field saves and joins/leaves are shown; lock chatter, tab views and
    /// keep-alives are not.
    pub fn accepts(event: &ActivityEvent) -> bool {
        matches!(
            event.kind,
            ActivityKind::FieldUpdated { .. }
                | ActivityKind::UserConnected
                | ActivityKind::UserDisconnected
        )
    }

    /// Prepend `event`, dropping the oldest entries beyond capacity.
    ///
    /// Returns the sequence number assigned to the new entry.
    pub fn record(&mut self, event: ActivityEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_front(FeedEntry { seq, event });
        self.entries.truncate(self.capacity);
        seq
    }

    /// Entries newest first.
    pub fn entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    /// The events alone, newest first.
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.entries.iter().map(|e| e.event.clone()).collect()
    }

    /// Newest field update not authored by `excluding_user_id` that has not
    /// been surfaced yet.
    pub fn latest_unseen_from(&self, excluding_user_id: &str) -> Option<&FeedEntry> {
        self.entries.iter().find(|entry| {
            entry.seq > self.seen_through
                && entry.event.is_field_update()
                && entry.event.user_id != excluding_user_id
        })
    }

    /// Mark everything up to and including `seq` as surfaced.
    pub fn mark_seen(&mut self, seq: u64) {
        self.seen_through = self.seen_through.max(seq);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_FEED_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Toast
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct VisibleToast {
    entry: FeedEntry,
    shown_at: Instant,
}

/// Shows one update from another collaborator at a time and hides it after
/// a fixed display period.
#[derive(Debug)]
pub struct ToastNotifier {
    display_for: Duration,
    visible: Option<VisibleToast>,
}

impl ToastNotifier {
    pub fn new(display_for: Duration) -> Self {
        Self {
            display_for,
            visible: None,
        }
    }

    /// Advance the toast to `now` and return what should be on screen.
    ///
    /// An expired toast is dismissed first; if nothing is showing, the
    /// newest unseen update from someone other than `local_user_id` is
    /// surfaced and marked seen in `feed`.
    pub fn poll(
        &mut self,
        feed: &mut ActivityFeed,
        local_user_id: &str,
        now: Instant,
    ) -> Option<&FeedEntry> {
        if self
            .visible
            .as_ref()
            .is_some_and(|t| now.saturating_duration_since(t.shown_at) >= self.display_for)
        {
            self.visible = None;
        }

        if self.visible.is_none() {
            if let Some(entry) = feed.latest_unseen_from(local_user_id).cloned() {
                feed.mark_seen(entry.seq);
                self.visible = Some(VisibleToast {
                    entry,
                    shown_at: now,
                });
            }
        }

        self.visible.as_ref().map(|t| &t.entry)
    }

    /// Hide the current toast immediately.
    pub fn dismiss(&mut self) {
        self.visible = None;
    }

    pub fn current(&self) -> Option<&FeedEntry> {
        self.visible.as_ref().map(|t| &t.entry)
    }
}

impl Default for ToastNotifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(TOAST_DISPLAY_SECS))
    }
}
