//! The edit-history ledger: durable append with a local mirror.
//!
//! Every save is appended to the durable store and, whatever the outcome,
//! prepended to the in-memory list and mirrored to the local fallback store.
//! Loads prefer the durable store and fall back to the local mirror when it
//! is unconfigured, failing, or empty. No ledger operation returns an error;
//! failures are logged and the latest durable failure is kept in
//! [`last_error`](EditHistoryLedger::last_error) for a non-blocking banner.

use std::sync::Arc;
use std::time::Duration;

use planboard_core::history::{
    distinct_sections, distinct_users, filter_entries, sort_newest_first, EditHistoryEntry,
    FieldEdit,
};
use planboard_core::identity::SessionUser;
use planboard_core::types::{now_millis, UserId};
use planboard_sheets::{DurableStore, LocalStore, EDIT_HISTORY_KEY};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct LedgerState {
    /// Newest first.
    entries: Vec<EditHistoryEntry>,
    loading: bool,
    last_error: Option<String>,
}

pub struct EditHistoryLedger {
    durable: Arc<dyn DurableStore>,
    local: Arc<dyn LocalStore>,
    state: RwLock<LedgerState>,
    /// Held across a state change and its mirror write so the mirror is
    /// written in the same order as the state changes. Readers never take it.
    mirror_lock: Mutex<()>,
}

impl EditHistoryLedger {
    /// An empty ledger. Call [`load`](Self::load) to populate it.
    pub fn new(durable: Arc<dyn DurableStore>, local: Arc<dyn LocalStore>) -> Self {
        Self {
            durable,
            local,
            state: RwLock::new(LedgerState::default()),
            mirror_lock: Mutex::new(()),
        }
    }

    /// Record one field save by `user`.
    ///
    /// Without a signed-in user nothing is recorded and `None` is returned.
    pub async fn append(&self, edit: FieldEdit, user: Option<&SessionUser>) -> Option<EditHistoryEntry> {
        let Some(user) = user else {
            tracing::warn!(field_id = %edit.field_id, "No session user, edit not recorded");
            return None;
        };

        let entry = EditHistoryEntry::record(edit, user, now_millis());

        let durable_error = match self.durable.append_history(&entry).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(entry_id = %entry.id, error = %e, "Durable history append failed, kept locally");
                Some(format!("Failed to save edit history: {e}"))
            }
        };

        let _mirror = self.mirror_lock.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            if durable_error.is_some() {
                state.last_error = durable_error;
            }
            state.entries.insert(0, entry.clone());
            state.entries.clone()
        };
        self.mirror(&snapshot).await;

        tracing::info!(
            entry_id = %entry.id,
            field_id = %entry.field_id,
            user_id = %entry.user_id,
            "Edit recorded",
        );
        Some(entry)
    }

    /// Reload from the durable store, falling back to the local mirror.
    ///
    /// The result replaces the in-memory list and overwrites the mirror.
    pub async fn load(&self) {
        self.state.write().await.loading = true;

        let (mut entries, error) = if self.durable.is_configured().await {
            match self.durable.fetch_history().await {
                Ok(fetched) if !fetched.is_empty() => (fetched, None),
                Ok(_) => {
                    tracing::debug!("Durable history is empty, using local mirror");
                    (self.read_local().await, None)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Durable history fetch failed, using local mirror");
                    (self.read_local().await, Some(format!("Failed to load edit history: {e}")))
                }
            }
        } else {
            tracing::debug!("Durable store not configured, using local mirror");
            (self.read_local().await, None)
        };

        sort_newest_first(&mut entries);
        tracing::debug!(count = entries.len(), "Edit history loaded");

        let _mirror = self.mirror_lock.lock().await;
        {
            let mut state = self.state.write().await;
            state.entries = entries.clone();
            state.last_error = error;
            state.loading = false;
        }
        self.mirror(&entries).await;
    }

    /// Forget every entry in memory and in the local mirror.
    ///
    /// The durable store is left untouched; the next load brings its
    /// entries back.
    pub async fn clear(&self) {
        let _mirror = self.mirror_lock.lock().await;
        self.state.write().await.entries.clear();
        if let Err(e) = self.local.remove(EDIT_HISTORY_KEY).await {
            tracing::warn!(error = %e, "Failed to clear local edit history");
        }
        tracing::info!("Local edit history cleared");
    }

    /// Every entry, newest first.
    pub async fn entries(&self) -> Vec<EditHistoryEntry> {
        self.state.read().await.entries.clone()
    }

    /// Entries matching the optional user and section filters, newest first.
    pub async fn filter(&self, user_id: Option<&str>, section: Option<&str>) -> Vec<EditHistoryEntry> {
        let state = self.state.read().await;
        filter_entries(&state.entries, user_id, section)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Distinct `(user_id, user_name)` pairs for the user filter.
    pub async fn users(&self) -> Vec<(UserId, String)> {
        distinct_users(&self.state.read().await.entries)
    }

    /// Distinct sections for the section filter.
    pub async fn sections(&self) -> Vec<String> {
        distinct_sections(&self.state.read().await.entries)
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// The most recent durable-store failure, cleared by a successful load.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Reload every `interval` until `cancel` fires.
    ///
    /// A poll and an append may interleave; whichever finishes last
    /// determines the in-memory list.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("History polling stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::trace!("Polling edit history");
                        ledger.load().await;
                    }
                }
            }
        })
    }

    // ---- private helpers ----

    async fn read_local(&self) -> Vec<EditHistoryEntry> {
        let raw = match self.local.read(EDIT_HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read local edit history");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Local edit history is corrupt, ignoring it");
            Vec::new()
        })
    }

    async fn mirror(&self, entries: &[EditHistoryEntry]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize edit history");
                return;
            }
        };
        if let Err(e) = self.local.write(EDIT_HISTORY_KEY, &json).await {
            tracing::warn!(error = %e, "Failed to mirror edit history locally");
        }
    }
}
