//! HTTP client for the spreadsheet proxy endpoint.
//!
//! The proxy accepts a single JSON command per `POST`
//! (`{action, sheetName, data?, rowIndex?}`) and answers with
//! `{success, data?, error?}`. A `GET` on the same URL is a health check
//! reporting whether the proxy has spreadsheet credentials configured.

use serde::{Deserialize, Serialize};

/// HTTP client for one proxy endpoint.
#[derive(Clone)]
pub struct SheetsProxyClient {
    client: reqwest::Client,
    proxy_url: String,
}

/// Command body sent to the proxy.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    action: &'a str,
    sheet_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row_index: Option<usize>,
}

/// Envelope every proxy command answers with.
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Body of the proxy's `GET` health check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHealth {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_configured: bool,
}

/// Errors from the proxy client.
#[derive(Debug, thiserror::Error)]
pub enum SheetsApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The proxy returned a non-2xx status code.
    #[error("Proxy API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The proxy answered `success: false`.
    #[error("Proxy rejected the request: {0}")]
    Rejected(String),
}

impl SheetsProxyClient {
    /// * `proxy_url` - full endpoint, e.g. `http://host:3000/api/google-sheets`.
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), proxy_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, proxy_url: impl Into<String>) -> Self {
        Self {
            client,
            proxy_url: proxy_url.into(),
        }
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// Read every row of `sheet` as a JSON object keyed by header.
    pub async fn get_sheet_data(&self, sheet: &str) -> Result<Vec<serde_json::Value>, SheetsApiError> {
        let data = self
            .command(ProxyRequest {
                action: "getSheetData",
                sheet_name: sheet,
                data: None,
                row_index: None,
            })
            .await?;

        Ok(match data {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => Vec::new(),
        })
    }

    /// Append one row to `sheet`.
    pub async fn append(&self, sheet: &str, row: &serde_json::Value) -> Result<(), SheetsApiError> {
        self.command(ProxyRequest {
            action: "append",
            sheet_name: sheet,
            data: Some(row),
            row_index: None,
        })
        .await?;
        Ok(())
    }

    /// Overwrite the row at `row_index` in `sheet`.
    pub async fn update(
        &self,
        sheet: &str,
        row_index: usize,
        row: &serde_json::Value,
    ) -> Result<(), SheetsApiError> {
        self.command(ProxyRequest {
            action: "update",
            sheet_name: sheet,
            data: Some(row),
            row_index: Some(row_index),
        })
        .await?;
        Ok(())
    }

    /// `GET` the endpoint to see whether the proxy is up and configured.
    pub async fn health(&self) -> Result<ProxyHealth, SheetsApiError> {
        let response = self.client.get(&self.proxy_url).send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    async fn command(&self, request: ProxyRequest<'_>) -> Result<Option<serde_json::Value>, SheetsApiError> {
        tracing::debug!(action = request.action, sheet = request.sheet_name, "Proxy command");

        let response = self
            .client
            .post(&self.proxy_url)
            .json(&request)
            .send()
            .await?;

        let envelope: ProxyResponse = Self::parse_response(response).await?;
        if !envelope.success {
            return Err(SheetsApiError::Rejected(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(envelope.data)
    }

    /// Ensure the response has a success status code, or turn it into
    /// [`SheetsApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SheetsApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SheetsApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SheetsApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
