//! The facade client end to end: shard plan, start, cache-or-fetch, shutdown
//!
//! Run with: cargo test -p integration-tests --test client

use integration_tests::{
    gateway_bot, guild_create, json_response, member, test_config, text_channel, MockGateway, MockHttp,
    BOT_USER_ID,
};
use serde_json::json;
use shardline::{ClientBuilder, Event, Snowflake};
use shardline_common::ShardCount;
use shardline_gateway::ShardState;

const GUILD: u64 = 100;

#[tokio::test(start_paused = true)]
async fn test_auto_sharded_client_serves_cache_and_rest() {
    let mut config = test_config();
    config.sharding.shard_count = ShardCount::Auto;
    config.sharding.concurrency = None;
    config.gateway.url = None;

    let http = MockHttp::new(|request| {
        if request.url.ends_with("/gateway/bot") {
            json_response(200, &gateway_bot(2, 1))
        } else if request.url.ends_with("/guilds/100/members/5") {
            json_response(200, &member(5, "five", &[]))
        } else {
            json_response(404, &json!({"code": 10004, "message": "Unknown"}))
        }
    });
    let (gateway, mut server) = MockGateway::new();
    let client = ClientBuilder::new(config)
        .gateway_transport(gateway.clone())
        .http_transport(http.clone())
        .build()
        .unwrap();

    let mut events = client.start().await.unwrap();
    assert_eq!(http.requests()[0].path(), "/gateway/bot");

    // Concurrency 1: the second shard connects only after the first is ready
    let mut first = server.accept().await;
    let first_shard = first.handshake("session-a", 41_250, &[GUILD]).await;
    let mut second = server.accept().await;
    let second_shard = second.handshake("session-b", 41_250, &[]).await;
    assert_eq!(first_shard + second_shard, 1);

    // Guild 100 belongs to shard 0
    let owner = if first_shard == 0 { &first } else { &second };
    owner.dispatch(
        2,
        "GUILD_CREATE",
        guild_create(GUILD, "Lounge", vec![text_channel(101, GUILD, "general")], vec![]),
    );

    let mut available = false;
    while !available {
        let event = events.recv().await.unwrap();
        available = matches!(event.event, Event::GuildAvailable(_));
    }

    let states = client.shard_states().await.unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|(_, state)| *state == ShardState::Ready));

    // Cached from READY: no request
    let before = http.request_count();
    let me = client.current_user().await.unwrap();
    assert_eq!(me.id, Snowflake::new(BOT_USER_ID));
    let channel = client.channel(Snowflake::new(101)).await.unwrap();
    assert_eq!(channel.and_then(|c| c.name).as_deref(), Some("general"));
    assert_eq!(http.request_count(), before);

    // Fetched once, then served from the cache
    let fetched = client
        .member(Snowflake::new(GUILD), Snowflake::new(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.user_id, Snowflake::new(5));
    client
        .member(Snowflake::new(GUILD), Snowflake::new(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(http.request_count(), before + 1);

    // Unknown entities are None, not errors
    assert!(client.channel(Snowflake::new(999)).await.unwrap().is_none());

    client.shutdown().await.unwrap();
    assert!(matches!(
        client.shard_states().await,
        Err(shardline::ClientError::NotStarted)
    ));
}
