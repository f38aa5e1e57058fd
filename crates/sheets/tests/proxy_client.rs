//! Exercises the proxy client and the history store against an in-process
//! stand-in for the spreadsheet proxy.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use planboard_core::history::EditHistoryEntry;
use planboard_sheets::{DurableStore, SheetsApiError, SheetsHistoryStore, SheetsProxyClient};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct FakeProxy {
    rows: Arc<Mutex<Vec<Value>>>,
    configured: bool,
}

async fn health(State(proxy): State<FakeProxy>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Google Sheets API route is running",
        "isConfigured": proxy.configured,
    }))
}

async fn command(State(proxy): State<FakeProxy>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["sheetName"] == "Broken" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "Apps Script URL is not configured"})),
        );
    }

    match body["action"].as_str() {
        Some("getSheetData") => {
            let rows = proxy.rows.lock().unwrap().clone();
            (StatusCode::OK, Json(json!({"success": true, "data": rows})))
        }
        Some("append") => {
            proxy.rows.lock().unwrap().push(body["data"].clone());
            (StatusCode::OK, Json(json!({"success": true})))
        }
        other => (
            StatusCode::OK,
            Json(json!({"success": false, "error": format!("Unknown action: {other:?}")})),
        ),
    }
}

async fn spawn_proxy(proxy: FakeProxy) -> String {
    let app = Router::new()
        .route("/api/google-sheets", get(health).post(command))
        .with_state(proxy);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/google-sheets")
}

fn entry(id: &str, ts: i64) -> EditHistoryEntry {
    EditHistoryEntry {
        id: id.into(),
        timestamp: ts,
        user_id: "u-1".into(),
        user_name: "Ada".into(),
        user_role: "editor".into(),
        field_id: "budget-venue-license".into(),
        section: "Budget".into(),
        previous_value: "100".into(),
        new_value: "250".into(),
    }
}

// ---------------------------------------------------------------------------
// Proxy client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_configuration() {
    let url = spawn_proxy(FakeProxy { configured: true, ..Default::default() }).await;
    let client = SheetsProxyClient::new(url);

    let health = client.health().await.unwrap();
    assert!(health.success);
    assert!(health.is_configured);
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let url = spawn_proxy(FakeProxy::default()).await;
    let client = SheetsProxyClient::new(url);

    let result = client.get_sheet_data("Broken").await;
    assert_matches!(result, Err(SheetsApiError::ApiError { status: 500, .. }));
}

#[tokio::test]
async fn success_false_is_rejected() {
    let url = spawn_proxy(FakeProxy::default()).await;
    let client = SheetsProxyClient::new(url);

    let result = client.update("EditHistory", 2, &json!({"id": "x"})).await;
    assert_matches!(result, Err(SheetsApiError::Rejected(msg)) if msg.contains("Unknown action"));
}

#[tokio::test]
async fn unreachable_proxy_is_request_error() {
    let client = SheetsProxyClient::new("http://127.0.0.1:9/api/google-sheets");
    assert_matches!(client.health().await, Err(SheetsApiError::Request(_)));
}

// ---------------------------------------------------------------------------
// History store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn appended_entries_read_back() {
    let proxy = FakeProxy { configured: true, ..Default::default() };
    let url = spawn_proxy(proxy.clone()).await;
    let store = SheetsHistoryStore::new(SheetsProxyClient::new(url), "EditHistory");

    assert!(store.is_configured().await);
    store.append_history(&entry("edit-1", 100)).await.unwrap();
    store.append_history(&entry("edit-2", 200)).await.unwrap();

    let fetched = store.fetch_history().await.unwrap();
    assert_eq!(fetched, vec![entry("edit-1", 100), entry("edit-2", 200)]);
    assert!(proxy.rows.lock().unwrap()[0]["timestamp"].is_string());
}

#[tokio::test]
async fn undecodable_rows_are_skipped() {
    let proxy = FakeProxy::default();
    proxy.rows.lock().unwrap().extend([
        json!({"id": "edit-1", "timestamp": 100}),
        json!({"timestamp": 200}),
        json!("not a row"),
        json!({"id": "edit-3", "timestamp": "2024-05-01T10:00:00.000Z"}),
    ]);
    let url = spawn_proxy(proxy).await;
    let store = SheetsHistoryStore::new(SheetsProxyClient::new(url), "EditHistory");

    let ids: Vec<_> = store
        .fetch_history()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, ["edit-1", "edit-3"]);
}

#[tokio::test]
async fn unconfigured_or_unreachable_proxy_is_not_configured() {
    let url = spawn_proxy(FakeProxy::default()).await;
    let store = SheetsHistoryStore::new(SheetsProxyClient::new(url), "EditHistory");
    assert!(!store.is_configured().await);

    let store = SheetsHistoryStore::new(
        SheetsProxyClient::new("http://127.0.0.1:9/api/google-sheets"),
        "EditHistory",
    );
    assert!(!store.is_configured().await);
}
