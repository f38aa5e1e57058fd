//! Domain types for the Planboard collaboration layer.
//!
//! This crate has no I/O. It holds the activity-event protocol, the
//! advisory field-lock table, the bounded activity feed, the per-tab viewer
//! roster and the edit-history entry model, so that the transport, storage
//! and session crates all agree on one vocabulary.

pub mod activity;
pub mod collaboration;
pub mod error;
pub mod field_lock;
pub mod history;
pub mod identity;
pub mod types;
pub mod viewers;
