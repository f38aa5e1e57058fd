//! Per-tab roster of who is currently viewing which dashboard tab.
//!
//! The roster is a fold over `TabViewStart` / `TabViewEnd` events. A lost
//! `TabViewEnd` (tab closed without teardown) leaves the viewer listed.

use std::collections::HashMap;

use crate::collaboration::{ActivityEvent, ActivityKind};
use crate::identity::Participant;
use crate::types::TabId;

#[derive(Debug, Default)]
pub struct TabViewerRoster {
    tabs: HashMap<TabId, Vec<Participant>>,
}

impl TabViewerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the roster. Returns `true` if the roster changed.
    pub fn apply(&mut self, event: &ActivityEvent) -> bool {
        match &event.kind {
            ActivityKind::TabViewStart { tab } => self.add(tab, event.author()),
            ActivityKind::TabViewEnd { tab } => self.remove(tab, &event.user_id),
            _ => false,
        }
    }

    fn add(&mut self, tab: &str, viewer: Participant) -> bool {
        let viewers = self.tabs.entry(tab.to_string()).or_default();
        if viewers.iter().any(|v| v.user_id == viewer.user_id) {
            return false;
        }
        viewers.push(viewer);
        true
    }

    fn remove(&mut self, tab: &str, user_id: &str) -> bool {
        let Some(viewers) = self.tabs.get_mut(tab) else {
            return false;
        };
        let before = viewers.len();
        viewers.retain(|v| v.user_id != user_id);
        let changed = viewers.len() != before;
        if viewers.is_empty() {
            self.tabs.remove(tab);
        }
        changed
    }

    /// Everyone viewing `tab`, in arrival order.
    pub fn viewers(&self, tab: &str) -> &[Participant] {
        self.tabs.get(tab).map(Vec::as_slice).unwrap_or_default()
    }

    /// Viewers of `tab` other than `local_user_id`.
    pub fn others(&self, tab: &str, local_user_id: &str) -> Vec<&Participant> {
        self.viewers(tab)
            .iter()
            .filter(|v| v.user_id != local_user_id)
            .collect()
    }
}
