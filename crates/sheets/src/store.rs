//! Durable edit-history storage behind the spreadsheet proxy.

use planboard_core::history::EditHistoryEntry;

use crate::api::{SheetsApiError, SheetsProxyClient};

/// Default sheet holding the edit history.
pub const EDIT_HISTORY_SHEET: &str = "EditHistory";

/// The durable sink for edit-history entries.
///
/// The ledger only appends and reads back; entries are never updated or
/// deleted through this seam.
#[async_trait::async_trait]
pub trait DurableStore: Send + Sync {
    /// Whether the backend is reachable and has credentials configured.
    /// Any failure counts as "not configured".
    async fn is_configured(&self) -> bool;

    /// Every decodable entry, in storage order.
    async fn fetch_history(&self) -> Result<Vec<EditHistoryEntry>, SheetsApiError>;

    /// Append one entry.
    async fn append_history(&self, entry: &EditHistoryEntry) -> Result<(), SheetsApiError>;
}

/// [`DurableStore`] over one sheet of the proxy.
pub struct SheetsHistoryStore {
    client: SheetsProxyClient,
    sheet: String,
}

impl SheetsHistoryStore {
    pub fn new(client: SheetsProxyClient, sheet: impl Into<String>) -> Self {
        Self {
            client,
            sheet: sheet.into(),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }
}

#[async_trait::async_trait]
impl DurableStore for SheetsHistoryStore {
    async fn is_configured(&self) -> bool {
        match self.client.health().await {
            Ok(health) => health.success && health.is_configured,
            Err(e) => {
                tracing::warn!(url = self.client.proxy_url(), error = %e, "Proxy health check failed");
                false
            }
        }
    }

    async fn fetch_history(&self) -> Result<Vec<EditHistoryEntry>, SheetsApiError> {
        let rows = self.client.get_sheet_data(&self.sheet).await?;
        let total = rows.len();

        let entries: Vec<EditHistoryEntry> = rows
            .iter()
            .filter_map(|row| match EditHistoryEntry::from_row(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(sheet = %self.sheet, error = %e, "Skipping undecodable history row");
                    None
                }
            })
            .collect();

        tracing::debug!(sheet = %self.sheet, total, decoded = entries.len(), "Fetched edit history");
        Ok(entries)
    }

    async fn append_history(&self, entry: &EditHistoryEntry) -> Result<(), SheetsApiError> {
        self.client.append(&self.sheet, &entry.to_row()).await
    }
}
