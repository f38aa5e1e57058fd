//! Storage backends for the edit-history ledger.
//!
//! - [`api`]: HTTP client for the spreadsheet proxy.
//! - [`store`]: the [`DurableStore`] seam and its proxy-backed implementation.
//! - [`local`]: local fallback key-value stores.

pub mod api;
pub mod local;
pub mod store;

pub use api::{ProxyHealth, SheetsApiError, SheetsProxyClient};
pub use local::{FileStore, LocalStore, LocalStoreError, MemoryStore, EDIT_HISTORY_KEY};
pub use store::{DurableStore, SheetsHistoryStore, EDIT_HISTORY_SHEET};
