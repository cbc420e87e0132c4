//! Cache contents as dispatches stream through a live shard
//!
//! Run with: cargo test -p integration-tests --test cache_consistency

use integration_tests::{guild_create, member, message, test_config, text_channel, user, Harness};
use serde_json::json;
use shardline_core::{Event, Snowflake};
use shardline_gateway::{GatewayFrame, OpCode};

const GUILD: u64 = 100;
const CHANNEL: u64 = 101;

fn id(raw: u64) -> Snowflake {
    Snowflake::new(raw)
}

#[tokio::test(start_paused = true)]
async fn test_entity_lifecycle_tracks_dispatches() {
    let mut h = Harness::start(&test_config(), 1, 1);
    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[GUILD]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));
    assert!(h.cache.is_unavailable(id(GUILD)));

    // Guild streams in
    conn.dispatch(
        2,
        "GUILD_CREATE",
        guild_create(
            GUILD,
            "Lounge",
            vec![text_channel(CHANNEL, GUILD, "general")],
            vec![member(1, "one", &[]), member(2, "two", &[])],
        ),
    );
    assert!(matches!(h.next_event().await.event, Event::GuildAvailable(ref g) if g.name == "Lounge"));
    assert!(!h.cache.is_unavailable(id(GUILD)));
    assert_eq!(h.cache.channel_guild(id(CHANNEL)), Some(id(GUILD)));
    assert_eq!(h.cache.guild_members(id(GUILD)).map(|m| m.len()), Some(2));

    // Channel rename replaces the channel
    conn.dispatch(3, "CHANNEL_UPDATE", text_channel(CHANNEL, GUILD, "lobby"));
    match h.next_event().await.event {
        Event::ChannelUpdate { old, new } => {
            assert_eq!(old.and_then(|c| c.name).as_deref(), Some("general"));
            assert_eq!(new.name.as_deref(), Some("lobby"));
        }
        other => panic!("expected ChannelUpdate, got {other:?}"),
    }
    assert_eq!(h.cache.channel(id(CHANNEL)).and_then(|c| c.name).as_deref(), Some("lobby"));

    // Member update merges onto the cached member
    conn.dispatch(
        4,
        "GUILD_MEMBER_UPDATE",
        json!({"guild_id": GUILD.to_string(), "user": user(1, "one"), "nick": "uno", "roles": []}),
    );
    match h.next_event().await.event {
        Event::MemberUpdate { old, new } => {
            assert_eq!(old.and_then(|m| m.nick), None);
            assert_eq!(new.nick.as_deref(), Some("uno"));
        }
        other => panic!("expected MemberUpdate, got {other:?}"),
    }
    assert_eq!(
        h.cache.member(id(GUILD), id(1)).and_then(|m| m.nick).as_deref(),
        Some("uno")
    );

    // Message create, edit, delete
    conn.dispatch(5, "MESSAGE_CREATE", message(500, CHANNEL, GUILD, 2, "hello"));
    assert!(matches!(h.next_event().await.event, Event::MessageCreate(ref m) if m.content == "hello"));
    assert!(h.cache.message(id(CHANNEL), id(500)).is_some());

    conn.dispatch(
        6,
        "MESSAGE_UPDATE",
        json!({
            "id": "500",
            "channel_id": CHANNEL.to_string(),
            "guild_id": GUILD.to_string(),
            "content": "hello, edited",
            "edited_timestamp": "2024-01-01T00:05:00+00:00"
        }),
    );
    match h.next_event().await.event {
        Event::MessageUpdate { old, new, .. } => {
            assert_eq!(old.map(|m| m.content).as_deref(), Some("hello"));
            assert_eq!(new.map(|m| m.content).as_deref(), Some("hello, edited"));
        }
        other => panic!("expected MessageUpdate, got {other:?}"),
    }

    conn.dispatch(
        7,
        "MESSAGE_DELETE",
        json!({"id": "500", "channel_id": CHANNEL.to_string(), "guild_id": GUILD.to_string()}),
    );
    match h.next_event().await.event {
        Event::MessageDelete { old, .. } => {
            assert_eq!(old.map(|m| m.content).as_deref(), Some("hello, edited"));
        }
        other => panic!("expected MessageDelete, got {other:?}"),
    }
    assert!(h.cache.message(id(CHANNEL), id(500)).is_none());

    // Member leaves
    conn.dispatch(
        8,
        "GUILD_MEMBER_REMOVE",
        json!({"guild_id": GUILD.to_string(), "user": user(2, "two")}),
    );
    assert!(matches!(h.next_event().await.event, Event::MemberRemove { old: Some(_), .. }));
    assert!(h.cache.member(id(GUILD), id(2)).is_none());

    // Bot leaves the guild: everything nested goes with it
    conn.dispatch(9, "GUILD_DELETE", json!({"id": GUILD.to_string()}));
    assert!(matches!(h.next_event().await.event, Event::GuildLeft { old: Some(_), .. }));
    assert!(h.cache.guild(id(GUILD)).is_none());
    assert!(h.cache.channel(id(CHANNEL)).is_none());
    assert!(h.cache.member(id(GUILD), id(1)).is_none());
    assert!(!h.cache.is_unavailable(id(GUILD)));

    h.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_replay_after_resume_is_idempotent() {
    let mut h = Harness::start(&test_config(), 1, 1);
    let mut conn = h.server.accept().await;
    conn.handshake("session-a", 41_250, &[GUILD]).await;
    assert!(matches!(h.next_event().await.event, Event::Ready(_)));

    conn.dispatch(
        2,
        "GUILD_CREATE",
        guild_create(GUILD, "Lounge", vec![text_channel(CHANNEL, GUILD, "general")], vec![member(1, "one", &[])]),
    );
    conn.dispatch(3, "MESSAGE_CREATE", message(500, CHANNEL, GUILD, 1, "hello"));
    let mut added = member(2, "two", &[]);
    added["guild_id"] = json!(GUILD.to_string());
    conn.dispatch(4, "GUILD_MEMBER_ADD", added.clone());
    for _ in 0..3 {
        h.next_event().await;
    }

    conn.send(&GatewayFrame::reconnect());
    assert_eq!(conn.closed().await, Some(4000));

    // The gateway replays what it is unsure the client saw, then RESUMED
    let mut resumed = h.server.accept().await;
    resumed.hello(41_250);
    let resume = resumed.expect(OpCode::Resume).await;
    assert_eq!(resume.d["seq"], 4);
    resumed.dispatch(3, "MESSAGE_CREATE", message(500, CHANNEL, GUILD, 1, "hello"));
    resumed.dispatch(4, "GUILD_MEMBER_ADD", added);
    resumed.dispatch(5, "RESUMED", serde_json::Value::Null);

    let mut names = Vec::new();
    for _ in 0..3 {
        names.push(h.next_event().await.event.name());
    }
    assert_eq!(names, vec!["MESSAGE_CREATE", "MEMBER_ADD", "RESUMED"]);

    assert_eq!(h.cache.messages(id(CHANNEL)).len(), 1);
    assert_eq!(h.cache.guild_members(id(GUILD)).map(|m| m.len()), Some(2));
    assert_eq!(h.cache.guild_ids(), vec![id(GUILD)]);

    h.coordinator.shutdown().await.unwrap();
}
