mod support;

use std::time::Duration;

use futures_util::SinkExt;
use geostrike_sync::network::{ConnectionError, LocalStore};
use geostrike_sync::{ConnectionState, EntityKind, SyncContext, SyncError, SyncEvent, Topic};
use serde_json::json;
use support::{FakeServer, TOKEN};
use tokio_tungstenite::tungstenite::Message;

fn loot(rarity: &str) -> serde_json::Value {
    json!({
        "itemType": "Loot",
        "rarity": rarity,
        "location": { "latitude": 10.0, "longitude": 10.0 },
        "etaTimeToExpiry": "2030-01-01T00:00:00Z"
    })
}

fn landmine(owner: &str) -> serde_json::Value {
    json!({
        "itemType": "Landmine",
        "type": "Basic",
        "placedBy": owner,
        "location": { "latitude": 10.0, "longitude": 10.0 },
        "etaTimeToExpiry": "2030-01-01T00:00:00Z"
    })
}

fn missile() -> serde_json::Value {
    json!({
        "itemType": "Missile",
        "currentLocation": { "latitude": 10.0, "longitude": 10.0 },
        "destination": { "latitude": 10.01, "longitude": 10.01 },
        "radius": 40,
        "sentByUsername": "rival",
        "etaTimeToImpact": "2030-01-01T00:00:00Z"
    })
}

fn is_entities(event: &SyncEvent) -> bool {
    matches!(event, SyncEvent::EntitiesUpdated { .. })
}

#[tokio::test]
async fn test_batch_routed_and_handshake_sent() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    let mut updates = ctx.subscribe(Topic::EntitiesUpdated);

    ctx.start().await.unwrap();
    assert_eq!(ctx.status().state, ConnectionState::Open);
    assert_eq!(ctx.status().generation, 1);
    assert!(ctx.connection_healthy());

    let mut ws = server.accept().await;
    support::send_msgpack(&mut ws, &json!([loot("rare"), landmine("alice"), loot("common")])).await;

    let event = support::wait_for(&mut updates, is_entities).await;
    assert_eq!(
        event,
        SyncEvent::EntitiesUpdated {
            kinds: vec![EntityKind::Landmine, EntityKind::Loot],
            generation: 1,
        }
    );
    assert_eq!(ctx.loot().len(), 2);
    assert_eq!(ctx.landmines()[0].placed_by, "alice");
    assert!(ctx.missiles().is_empty());

    // The first server message is answered with the credential token.
    let auth = support::next_command(&mut ws).await;
    assert_eq!(auth, json!({ "messages": [ { "itemType": "authenticate", "token": TOKEN } ] }));
}

#[tokio::test]
async fn test_json_text_fallback() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    let mut updates = ctx.subscribe(Topic::EntitiesUpdated);
    ctx.start().await.unwrap();

    let mut ws = server.accept().await;
    support::send_text(&mut ws, &missile()).await;

    support::wait_for(&mut updates, is_entities).await;
    let missiles = ctx.missiles();
    assert_eq!(missiles.len(), 1);
    assert_eq!(missiles[0].sent_by_username, "rival");
}

#[tokio::test]
async fn test_garbage_frame_is_discarded() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    let mut updates = ctx.subscribe(Topic::EntitiesUpdated);
    ctx.start().await.unwrap();

    let mut ws = server.accept().await;
    ws.send(Message::Binary(vec![0xc1, 0xff, 0x00])).await.unwrap();
    support::send_msgpack(&mut ws, &json!([loot("after")])).await;

    let event = support::wait_for(&mut updates, is_entities).await;
    assert!(matches!(
        event,
        SyncEvent::EntitiesUpdated { ref kinds, .. } if kinds == &[EntityKind::Loot]
    ));
    assert_eq!(ctx.loot()[0].rarity, "after");
    assert_eq!(ctx.status().state, ConnectionState::Open);
}

#[tokio::test]
async fn test_request_and_fetch() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    ctx.start().await.unwrap();
    let mut ws = server.accept().await;

    ctx.request(EntityKind::Loot).unwrap();
    assert_eq!(
        support::next_command(&mut ws).await,
        json!({ "messages": [ { "itemType": "FetchLoot" } ] })
    );

    let fetching = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.fetch(EntityKind::Missile, Duration::from_secs(5)).await }
    });
    assert_eq!(
        support::next_command(&mut ws).await,
        json!({ "messages": [ { "itemType": "FetchMissiles" } ] })
    );
    support::send_msgpack(&mut ws, &json!([missile(), missile()])).await;

    let kinds = fetching.await.unwrap().unwrap();
    assert_eq!(kinds, vec![EntityKind::Missile]);
    assert_eq!(ctx.missiles().len(), 2);
}

#[tokio::test]
async fn test_fetch_times_out_without_reply() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    ctx.start().await.unwrap();
    let _ws = server.accept().await;

    let result = ctx.fetch(EntityKind::Landmine, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(SyncError::Timeout(_))));
}

#[tokio::test]
async fn test_report_location() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    ctx.start().await.unwrap();
    let mut ws = server.accept().await;

    ctx.report_location(geostrike_sync::GeoLocation::new(1.5, -2.5)).unwrap();
    assert_eq!(
        support::next_command(&mut ws).await,
        json!({ "messages": [ { "lat": 1.5, "lon": -2.5 } ] })
    );
}

#[tokio::test]
async fn test_initial_connect_failure() {
    let ctx = SyncContext::new(support::config(&support::dead_url())).unwrap();
    let result = ctx.start().await;

    assert!(matches!(result, Err(SyncError::Connection(_))));
    assert_eq!(ctx.status().state, ConnectionState::Closed);
    assert!(!ctx.connection_healthy());
}

#[tokio::test]
async fn test_reconnects_after_drop() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    let mut states = ctx.subscribe(Topic::ConnectionStateChanged);
    let mut updates = ctx.subscribe(Topic::EntitiesUpdated);
    ctx.start().await.unwrap();

    let mut first = server.accept().await;
    first.close(None).await.unwrap();
    drop(first);

    support::wait_for(&mut states, |e| {
        matches!(
            e,
            SyncEvent::ConnectionStateChanged(s) if s.state == ConnectionState::Reconnecting
        )
    })
    .await;
    support::wait_for(&mut states, |e| {
        matches!(
            e,
            SyncEvent::ConnectionStateChanged(s)
                if s.state == ConnectionState::Open && s.generation == 2
        )
    })
    .await;
    assert_eq!(ctx.status().reconnect_attempt, 0);

    let mut second = server.accept().await;
    support::send_msgpack(&mut second, &json!([landmine("bob")])).await;

    let event = support::wait_for(&mut updates, is_entities).await;
    assert!(matches!(event, SyncEvent::EntitiesUpdated { generation: 2, .. }));
    assert_eq!(ctx.landmines()[0].placed_by, "bob");
}

#[tokio::test]
async fn test_gives_up_after_budget() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    let mut states = ctx.subscribe(Topic::ConnectionStateChanged);
    ctx.start().await.unwrap();

    let ws = server.accept().await;
    server.stop().await;
    drop(ws);

    let closed = support::wait_for(&mut states, |e| {
        matches!(e, SyncEvent::ConnectionStateChanged(s) if s.state == ConnectionState::Closed)
    })
    .await;
    assert!(matches!(closed, SyncEvent::ConnectionStateChanged(s) if s.reconnect_attempt == 3));
    assert_eq!(ctx.status().state, ConnectionState::Closed);
    assert!(!ctx.connection_healthy());

    // Nothing further is scheduled.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(states.try_recv().is_none());
}

#[tokio::test]
async fn test_shutdown_closes() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();
    ctx.start().await.unwrap();
    let _ws = server.accept().await;

    ctx.shutdown();
    assert_eq!(ctx.status().state, ConnectionState::Closed);
    assert!(!ctx.connection_healthy());
    assert!(matches!(ctx.request(EntityKind::Loot), Err(SyncError::Connection(_))));
}

#[tokio::test]
async fn test_concurrent_start_opens_one_connection() {
    let mut server = FakeServer::start().await;
    let ctx = SyncContext::new(support::config(&server.url)).unwrap();

    let (a, b) = tokio::join!(ctx.start(), ctx.start());
    let (won, lost) = if a.is_ok() { (a, b) } else { (b, a) };
    assert!(won.is_ok());
    assert!(matches!(
        lost,
        Err(SyncError::Connection(ConnectionError::AlreadyConnected))
    ));

    let _ws = server.accept().await;
    assert!(server.try_accept(Duration::from_millis(200)).await.is_none());
    assert_eq!(ctx.status().state, ConnectionState::Open);
    assert_eq!(ctx.status().generation, 1);
}

#[tokio::test]
async fn test_drop_closes_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.bin");
    let mut server = FakeServer::start().await;

    let mut config = support::config(&server.url);
    config.store_path = Some(path.clone());
    let ctx = SyncContext::new(config).unwrap();
    let other = ctx.clone();
    ctx.start().await.unwrap();
    let mut ws = server.accept().await;
    assert!(ctx.connection_healthy());

    // A surviving clone keeps the connection up.
    drop(ctx);
    assert_eq!(other.status().state, ConnectionState::Open);

    drop(other);
    support::wait_closed(&mut ws).await;
    assert!(server.try_accept(Duration::from_millis(200)).await.is_none());
    assert!(!LocalStore::open(&path).unwrap().connection_healthy());
}
