//! Advisory single-holder locks on editable fields.
//!
//! A field lock is a usability soft-lock: it tells other collaborators that
//! someone is already editing a field so the UI can refuse to open it.
//! Operations never fail. A denied acquisition is a normal outcome reported
//! through the return value, not an error.
//!
//! Locks never expire. A client that disappears without releasing leaves its
//! locks behind until the holder releases them explicitly.

use std::collections::HashMap;

use serde::Serialize;

use crate::identity::Participant;
use crate::types::FieldId;

/// A snapshot of one held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldLock {
    pub field_id: FieldId,
    pub holder: Participant,
}

/// Maps each field to the single participant currently editing it.
#[derive(Debug, Default)]
pub struct FieldLockTracker {
    locks: HashMap<FieldId, Participant>,
}

impl FieldLockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `field_id` for `user`.
    ///
    /// Returns `true` if `user` holds the lock afterwards: either the field
    /// was free or `user` already held it. Returns `false`, leaving the
    /// current holder untouched, when someone else holds it.
    pub fn acquire(&mut self, field_id: &str, user: &Participant) -> bool {
        match self.locks.get(field_id) {
            Some(holder) => holder.user_id == user.user_id,
            None => {
                self.locks.insert(field_id.to_string(), user.clone());
                true
            }
        }
    }

    /// Drop the lock on `field_id` if `user_id` holds it.
    ///
    /// Returns `true` if a lock was removed.
    pub fn release(&mut self, field_id: &str, user_id: &str) -> bool {
        match self.locks.get(field_id) {
            Some(holder) if holder.user_id == user_id => {
                self.locks.remove(field_id);
                true
            }
            _ => false,
        }
    }

    /// Current holder of `field_id`, if any.
    pub fn query(&self, field_id: &str) -> Option<&Participant> {
        self.locks.get(field_id)
    }

    /// `true` when somebody other than `user_id` holds the field.
    ///
    /// This is the check the UI performs before entering edit mode.
    pub fn is_blocked_for(&self, field_id: &str, user_id: &str) -> bool {
        self.query(field_id)
            .is_some_and(|holder| holder.user_id != user_id)
    }

    /// All held locks, ordered by field id.
    pub fn locks(&self) -> Vec<FieldLock> {
        let mut locks: Vec<FieldLock> = self
            .locks
            .iter()
            .map(|(field_id, holder)| FieldLock {
                field_id: field_id.clone(),
                holder: holder.clone(),
            })
            .collect();
        locks.sort_by(|a, b| a.field_id.cmp(&b.field_id));
        locks
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Participant {
        Participant::new("user-a", "Alex")
    }

    fn b() -> Participant {
        Participant::new("user-b", "Blair")
    }

    #[test]
    fn acquire_free_field_grants() {
        let mut locks = FieldLockTracker::new();
        assert!(locks.acquire("budget-1", &a()));
        assert_eq!(locks.query("budget-1"), Some(&a()));
    }

    #[test]
    fn other_user_cannot_take_held_field() {
        let mut locks = FieldLockTracker::new();
        locks.acquire("budget-1", &a());

        assert!(!locks.acquire("budget-1", &b()));
        assert_eq!(locks.query("budget-1").map(|p| p.user_id.as_str()), Some("user-a"));
    }

    #[test]
    fn reacquire_by_holder_is_idempotent() {
        let mut locks = FieldLockTracker::new();
        assert!(locks.acquire("budget-1", &a()));
        assert!(locks.acquire("budget-1", &a()));

        assert_eq!(locks.query("budget-1"), Some(&a()));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn release_by_non_holder_is_noop() {
        let mut locks = FieldLockTracker::new();
        locks.acquire("budget-1", &a());

        assert!(!locks.release("budget-1", "user-b"));
        assert_eq!(locks.query("budget-1"), Some(&a()));
    }

    #[test]
    fn release_unknown_field_is_noop() {
        let mut locks = FieldLockTracker::new();
        assert!(!locks.release("nope", "user-a"));
        assert!(locks.is_empty());
    }

    #[test]
    fn handover_after_release() {
        let mut locks = FieldLockTracker::new();
        locks.acquire("budget-1", &a());
        assert!(!locks.acquire("budget-1", &b()));

        assert!(locks.release("budget-1", "user-a"));
        assert!(locks.acquire("budget-1", &b()));
        assert_eq!(locks.query("budget-1"), Some(&b()));
    }

    #[test]
    fn is_blocked_for_only_other_users() {
        let mut locks = FieldLockTracker::new();
        locks.acquire("timeline-2", &a());

        assert!(!locks.is_blocked_for("timeline-2", "user-a"));
        assert!(locks.is_blocked_for("timeline-2", "user-b"));
        assert!(!locks.is_blocked_for("timeline-3", "user-b"));
    }

    #[test]
    fn locks_snapshot_is_sorted() {
        let mut locks = FieldLockTracker::new();
        locks.acquire("timeline-2", &a());
        locks.acquire("budget-1", &b());

        let snapshot = locks.locks();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].field_id, "budget-1");
        assert_eq!(snapshot[1].holder, a());
    }
}
