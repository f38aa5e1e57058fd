//! `WsManager` behaviour without HTTP upgrades: registration, user
//! identification, fan-out and shutdown.

use axum::extract::ws::Message;
use planboard_relay::ws::WsManager;

fn text(msg: &Message) -> Option<&str> {
    match msg {
        Message::Text(t) => Some(t.as_str()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _a = manager.add("conn-a".into()).await;
    let _b = manager.add("conn-b".into()).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.remove("conn-a").await;
    manager.remove("never-added").await;
    assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn reconnect_with_same_id_replaces_connection() {
    let manager = WsManager::new();

    let mut stale = manager.add("conn-a".into()).await;
    let mut fresh = manager.add("conn-a".into()).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.broadcast(Message::Text("after reconnect".into())).await;

    let msg = fresh.recv().await.expect("replacement receives frames");
    assert_eq!(text(&msg), Some("after reconnect"));
    assert!(stale.recv().await.is_none(), "replaced sender is dropped");
}

#[tokio::test]
async fn first_identification_sticks() {
    let manager = WsManager::new();
    let _a = manager.add("conn-a".into()).await;
    let _b = manager.add("conn-b".into()).await;

    manager.identify("conn-a", "user-1").await;
    manager.identify("conn-a", "user-2").await;
    manager.identify("conn-b", "").await;

    assert_eq!(manager.get_by_user("user-1").await, ["conn-a"]);
    assert!(manager.get_by_user("user-2").await.is_empty());
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_live_connections_only() {
    let manager = WsManager::new();

    let gone = manager.add("conn-gone".into()).await;
    let mut a = manager.add("conn-a".into()).await;
    let mut b = manager.add("conn-b".into()).await;
    drop(gone);

    let frame = r#"{"type":"USER_CONNECTED","userId":"u-1","userName":"Ada","colorTag":"blue","timestamp":1}"#;
    manager.broadcast(Message::Text(frame.into())).await;

    for rx in [&mut a, &mut b] {
        let msg = rx.recv().await.expect("frame delivered");
        assert_eq!(text(&msg), Some(frame));
    }
}

#[tokio::test]
async fn ping_all_sends_ping_frames() {
    let manager = WsManager::new();
    let mut a = manager.add("conn-a".into()).await;

    manager.ping_all().await;

    let msg = a.recv().await.expect("ping delivered");
    assert!(matches!(msg, Message::Ping(_)), "expected ping, got {msg:?}");
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_closes_every_connection() {
    let manager = WsManager::new();
    let mut a = manager.add("conn-a".into()).await;
    let mut b = manager.add("conn-b".into()).await;

    manager.shutdown_all().await;
    assert_eq!(manager.connection_count().await, 0);

    for rx in [&mut a, &mut b] {
        let msg = rx.recv().await.expect("close delivered");
        assert!(matches!(msg, Message::Close(None)), "expected close, got {msg:?}");
        assert!(rx.recv().await.is_none());
    }
}
