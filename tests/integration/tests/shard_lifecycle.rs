//! Shard lifecycle against the in-memory gateway
//!
//! Run with: cargo test -p integration-tests --test shard_lifecycle

use integration_tests::{message, ready, test_config, ClientFrame, Harness, GATEWAY_URL, RESUME_URL};
use serde_json::json;
use shardline_core::{Event, Snowflake};
use shardline_gateway::protocol::RequestGuildMembers;
use shardline_gateway::{CoordinatorError, GatewayFrame, OpCode, ShardCommand, ShardState};
use std::time::Duration;
use tokio::time::Instant;

fn connect_url(base: &str) -> String {
    format!("{base}/?v=10&encoding=json")
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_identify_then_ready() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    assert_eq!(conn.url, connect_url(GATEWAY_URL));

    conn.hello(41_250);
    let identify = conn.expect(OpCode::Identify).await;
    assert_eq!(identify.d["token"], "test-token");
    assert_eq!(identify.d["shard"], json!([0, 1]));
    assert_eq!(identify.d["large_threshold"], 250);

    conn.dispatch(1, "READY", ready("session-a", [0, 1], &[100], None));
    let event = h.next_event().await;
    assert_eq!(event.shard_id, 0);
    assert!(matches!(event.event, Event::Ready(ref r) if r.session_id == "session-a"));

    let shard = h.coordinator.shard(0).unwrap();
    shard.wait_for_state(ShardState::Ready).await.unwrap();
    assert!(h.cache.is_unavailable(Snowflake::new(100)));
    assert_eq!(h.coordinator.handshakes_in_flight(), 0);

    h.coordinator.shutdown().await.unwrap();
    assert_eq!(conn.closed().await, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_missing_hello_reconnects() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut silent = h.server.accept().await;
    let started = Instant::now();
    // No Hello: the handshake deadline closes the connection for a retry
    assert_eq!(silent.closed().await, Some(4000));
    assert!(started.elapsed() >= Duration::from_secs(20));

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));
    h.coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Steady State
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_commands_are_sent_once_ready() {
    let mut h = Harness::start(&test_config(), 1, 1);
    let mut conn = h.server.accept().await;

    // Queued during the handshake; held back until READY
    let guild_id = Snowflake::new(100);
    h.coordinator
        .send_to_guild(guild_id, ShardCommand::RequestGuildMembers(RequestGuildMembers::all(guild_id)))
        .await
        .unwrap();

    conn.handshake("session-a", 41_250, &[100]).await;
    let request = conn.expect(OpCode::RequestGuildMembers).await;
    assert_eq!(request.d["guild_id"], "100");
    assert_eq!(request.d["limit"], 0);

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_keeps_connection_alive() {
    let mut config = test_config();
    config.gateway.event_buffer = 1;
    let mut h = Harness::start(&config, 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 1_000, &[]).await;
    for id in 2..=4 {
        conn.dispatch(id, "MESSAGE_CREATE", message(id, 101, 100, 1, "queued"));
    }

    // Nothing is consumed for several intervals; heartbeats keep going out
    // and the connection is not mistaken for a zombie
    for _ in 0..5 {
        conn.expect(OpCode::Heartbeat).await;
        conn.heartbeat_ack();
    }
    assert_eq!(h.gateway.urls().len(), 1);

    assert!(matches!(h.next_event().await.event, Event::Ready(_)));
    for id in 2..=4 {
        match h.next_event().await.event {
            Event::MessageCreate(created) => assert_eq!(created.id, Snowflake::new(id)),
            other => panic!("expected MessageCreate, got {other:?}"),
        }
    }
    assert_eq!(h.coordinator.shard(0).unwrap().state(), ShardState::Ready);

    h.coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Connection Loss
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_zombie_connection_resumes_on_resume_url() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 1_000, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    // Heartbeats are never acknowledged: the shard drops the connection
    // without a close frame
    let mut heartbeats = 0;
    while let Some(frame) = conn.next().await {
        match frame {
            ClientFrame::Frame(frame) if frame.op == OpCode::Heartbeat => heartbeats += 1,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(heartbeats, 1);

    let mut resumed = h.server.accept().await;
    assert_eq!(resumed.url, connect_url(RESUME_URL));
    resumed.hello(1_000);
    let resume = resumed.expect(OpCode::Resume).await;
    assert_eq!(resume.d["session_id"], "session-a");
    assert_eq!(resume.d["seq"], 1);
    assert_eq!(resume.d["token"], "test-token");

    resumed.dispatch(2, "RESUMED", serde_json::Value::Null);
    assert_eq!(h.next_event().await.event, Event::Resumed);

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_request_resumes() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    conn.send(&GatewayFrame::reconnect());
    assert_eq!(conn.closed().await, Some(4000));

    let mut resumed = h.server.accept().await;
    assert_eq!(resumed.url, connect_url(RESUME_URL));
    resumed.hello(41_250);
    let resume = resumed.expect(OpCode::Resume).await;
    assert_eq!(resume.d["session_id"], "session-a");

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refused_connections_back_off() {
    let mut h = Harness::start(&test_config(), 1, 1);
    h.gateway.refuse_next(2);

    let started = Instant::now();
    let mut conn = h.server.accept().await;
    // 1s then 2s between the three attempts
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(h.gateway.urls().len(), 3);

    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));
    h.coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Session Invalidation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_invalid_session_identifies_again() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    let invalidated = Instant::now();
    conn.send(&GatewayFrame::invalid_session(false));
    assert_eq!(conn.closed().await, Some(4000));

    let mut fresh = h.server.accept().await;
    let waited = invalidated.elapsed();
    assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(6), "waited {waited:?}");
    assert_eq!(fresh.url, connect_url(GATEWAY_URL));

    fresh.hello(41_250);
    let identify = fresh.expect(OpCode::Identify).await;
    assert_eq!(identify.d["shard"], json!([0, 1]));
    fresh.dispatch(1, "READY", ready("session-b", [0, 1], &[], None));
    assert!(matches!(h.next_event().await.event, Event::Ready(ref r) if r.session_id == "session-b"));

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resumable_invalid_session_resumes() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    conn.send(&GatewayFrame::invalid_session(true));
    assert_eq!(conn.closed().await, Some(4000));

    let mut resumed = h.server.accept().await;
    assert_eq!(resumed.url, connect_url(RESUME_URL));
    resumed.hello(41_250);
    resumed.expect(OpCode::Resume).await;

    h.coordinator.shutdown().await.unwrap();
}

// =============================================================================
// Fatal Close
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_is_fatal() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.hello(41_250);
    conn.expect(OpCode::Identify).await;
    conn.close(4004, "Authentication failed");

    let event = h.next_event().await;
    assert!(
        matches!(event.event, Event::ShardFailed { close_code: Some(4004), .. }),
        "got {event:?}"
    );

    let err = h.coordinator.wait().await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::ShardFailed { shard_id: 0, close_code: Some(4004), .. }
    ));

    // No reconnect after a fatal close
    assert!(h.server.try_accept(Duration::from_secs(120)).await.is_none());
    assert_eq!(h.gateway.urls().len(), 1);
}
