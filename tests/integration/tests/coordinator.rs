//! Coordinator behaviour across several shards
//!
//! Run with: cargo test -p integration-tests --test coordinator

use integration_tests::{test_config, Harness, GATEWAY_URL, RESUME_URL};
use shardline_common::FatalShardPolicy;
use shardline_core::Event;
use shardline_gateway::{GatewayFrame, OpCode, ShardState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_handshakes_respect_concurrency_and_spacing() {
    let mut h = Harness::start(&test_config(), 4, 2);

    let mut first = h.server.accept().await;
    let first_at = Instant::now();
    let mut second = h.server.accept().await;
    let second_at = Instant::now();
    assert!(second_at - first_at >= Duration::from_millis(100));

    // Both slots are taken until a handshake completes
    assert!(h.server.try_accept(Duration::from_secs(5)).await.is_none());
    assert_eq!(h.coordinator.handshakes_in_flight(), 2);

    first.handshake("session-0", 41_250, &[]).await;
    let mut third = h.server.accept().await;
    second.handshake("session-1", 41_250, &[]).await;
    let mut fourth = h.server.accept().await;
    third.handshake("session-2", 41_250, &[]).await;
    fourth.handshake("session-3", 41_250, &[]).await;

    let mut ready = Vec::new();
    while ready.len() < 4 {
        let event = h.next_event().await;
        if let Event::Ready(_) = event.event {
            ready.push(event.shard_id);
        }
    }
    ready.sort_unstable();
    assert_eq!(ready, vec![0, 1, 2, 3]);
    assert_eq!(h.coordinator.max_handshakes_in_flight(), 2);

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_zombie_shard_does_not_disturb_others() {
    let mut h = Harness::start(&test_config(), 2, 2);

    let mut a = h.server.accept().await;
    let mut b = h.server.accept().await;
    let shard_a = a.handshake("session-a", 1_000, &[]).await;
    let shard_b = b.handshake("session-b", 1_000, &[]).await;
    assert_ne!(shard_a, shard_b);

    // Only b acknowledges heartbeats
    let healthy = tokio::spawn(b.keep_alive());
    assert_eq!(a.closed().await, None);

    let mut resumed = h.server.accept().await;
    assert_eq!(resumed.url, format!("{RESUME_URL}/?v=10&encoding=json"));
    resumed.hello(1_000);
    let resume = resumed.expect(OpCode::Resume).await;
    assert_eq!(resume.d["session_id"], "session-a");

    assert!(!healthy.is_finished());
    let other = h.coordinator.shard(shard_b).unwrap();
    assert_eq!(other.state(), ShardState::Ready);
    assert_eq!(h.gateway.urls().len(), 3);

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fatal_shard_with_continue_policy() {
    let mut config = test_config();
    config.sharding.on_fatal = FatalShardPolicy::Continue;
    let mut h = Harness::start(&config, 2, 2);

    let mut a = h.server.accept().await;
    let mut b = h.server.accept().await;
    b.handshake("session-b", 41_250, &[]).await;

    a.hello(41_250);
    let identify = a.expect(OpCode::Identify).await;
    let failed_shard = identify.d["shard"][0].as_u64().unwrap();
    a.close(4014, "Disallowed intents");

    let mut saw_failure = false;
    while !saw_failure {
        let event = h.next_event().await;
        if let Event::ShardFailed { close_code, .. } = event.event {
            assert_eq!(close_code, Some(4014));
            assert_eq!(u64::from(event.shard_id), failed_shard);
            saw_failure = true;
        }
    }

    let states = h.coordinator.shard_states();
    assert_eq!(states.len(), 1);
    assert_ne!(u64::from(states[0].0), failed_shard);

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_every_shard_and_ends_stream() {
    let mut h = Harness::start(&test_config(), 2, 2);

    let mut a = h.server.accept().await;
    let mut b = h.server.accept().await;
    a.handshake("session-a", 41_250, &[]).await;
    b.handshake("session-b", 41_250, &[]).await;

    h.coordinator.shutdown().await.unwrap();
    assert_eq!(a.closed().await, Some(1000));
    assert_eq!(b.closed().await, Some(1000));
    assert!(h.coordinator.shard_states().is_empty());

    // Whatever was queued drains, then the stream ends
    while let Some(event) = h.events.recv().await {
        assert!(matches!(event.event, Event::Ready(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_bounded_while_waiting() {
    let mut config = test_config();
    config.shutdown_timeout = Duration::from_secs(5);
    let mut h = Harness::start(&config, 1, 1);
    h.gateway.stall_closes();

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    let coordinator = Arc::new(h.coordinator);
    let waiter = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.wait().await }
    });
    // Let the waiter take the supervisor
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The shard never finishes closing, so only the timeout ends shutdown
    let started = Instant::now();
    coordinator.shutdown().await.unwrap();
    let took = started.elapsed();
    assert!(took >= Duration::from_secs(5), "took {took:?}");
    assert!(took < Duration::from_secs(6), "took {took:?}");

    assert!(waiter.await.unwrap().is_ok());
    assert_eq!(conn.closed().await, Some(1000));
    assert!(coordinator.shard_states().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_panicked_shard_restarts_with_fresh_session() {
    let mut h = Harness::start(&test_config(), 1, 1);

    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    h.gateway.panic_next();
    conn.send(&GatewayFrame::reconnect());
    assert_eq!(conn.closed().await, Some(4000));

    // The resume attempt panics; the replacement shard starts over
    let mut fresh = h.server.accept().await;
    assert_eq!(fresh.url, format!("{GATEWAY_URL}/?v=10&encoding=json"));
    fresh.hello(41_250);
    let identify = fresh.expect(OpCode::Identify).await;
    assert_eq!(identify.d["shard"][0], 0);
    assert_eq!(h.gateway.urls().len(), 3);

    fresh.dispatch(1, "READY", integration_tests::ready("session-b", [0, 1], &[], None));
    assert!(matches!(h.next_event().await.event, Event::Ready(ref r) if r.session_id == "session-b"));
    assert_eq!(h.coordinator.shard_states(), vec![(0, ShardState::Ready)]);

    h.coordinator.shutdown().await.unwrap();
}
