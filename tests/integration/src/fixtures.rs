//! Test fixtures
//!
//! Wire payloads as the platform sends them, a client configuration tuned for
//! paused-time tests, and a helper that starts a coordinator against the
//! in-memory gateway.

use serde_json::{json, Value};
use shardline_cache::{CacheConfig, EntityCache};
use shardline_common::{BackoffConfig, ClientConfig, ShardCount, Token};
use shardline_gateway::{Coordinator, CoordinatorConfig, Dispatcher, EventStream};
use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{GatewayServer, MockGateway};

pub const GATEWAY_URL: &str = "wss://gateway.test";
pub const RESUME_URL: &str = "wss://resume.test";
pub const API_BASE_URL: &str = "https://api.test";
pub const BOT_USER_ID: u64 = 900;

// =============================================================================
// Configuration
// =============================================================================

/// Client configuration with short, jitter-free timings
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new(Token::new("test-token"));
    config.sharding.shard_count = ShardCount::Fixed(1);
    config.sharding.concurrency = Some(1);
    config.sharding.identify_interval = Duration::from_millis(100);
    config.gateway.url = Some(GATEWAY_URL.to_string());
    config.gateway.event_buffer = 64;
    config.rest.api_base_url = API_BASE_URL.to_string();
    config.rest.global_limit_per_second = 0;
    config.backoff = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(60)).without_jitter();
    config
}

// =============================================================================
// Gateway Payloads
// =============================================================================

pub fn user(id: u64, username: &str) -> Value {
    json!({
        "id": id.to_string(),
        "username": username,
        "global_name": null,
        "avatar": null,
        "bot": false
    })
}

pub fn ready(session_id: &str, shard: [u32; 2], guild_ids: &[u64], resume_url: Option<&str>) -> Value {
    let guilds: Vec<Value> = guild_ids
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "user": {"id": BOT_USER_ID.to_string(), "username": "shardline", "bot": true},
        "guilds": guilds,
        "session_id": session_id,
        "resume_gateway_url": resume_url.unwrap_or(RESUME_URL),
        "shard": shard
    })
}

pub fn text_channel(id: u64, guild_id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "guild_id": guild_id.to_string(),
        "type": 0,
        "name": name,
        "position": 0,
        "topic": null,
        "nsfw": false
    })
}

pub fn member(user_id: u64, username: &str, roles: &[u64]) -> Value {
    let roles: Vec<String> = roles.iter().map(ToString::to_string).collect();
    json!({
        "user": user(user_id, username),
        "nick": null,
        "roles": roles,
        "joined_at": "2024-01-01T00:00:00+00:00",
        "deaf": false,
        "mute": false
    })
}

pub fn guild_create(id: u64, name: &str, channels: Vec<Value>, members: Vec<Value>) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "owner_id": "1",
        "member_count": members.len(),
        "large": false,
        "channels": channels,
        "roles": [{"id": id.to_string(), "name": "@everyone", "permissions": "104324673"}],
        "members": members,
        "voice_states": []
    })
}

pub fn message(id: u64, channel_id: u64, guild_id: u64, author_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "guild_id": guild_id.to_string(),
        "author": user(author_id, "author"),
        "content": content,
        "timestamp": "2024-01-01T00:00:00+00:00",
        "edited_timestamp": null,
        "type": 0,
        "pinned": false,
        "tts": false,
        "mentions": [],
        "mention_roles": [],
        "attachments": []
    })
}

// =============================================================================
// REST Payloads
// =============================================================================

pub fn gateway_bot(shards: u32, max_concurrency: u32) -> Value {
    json!({
        "url": GATEWAY_URL,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": max_concurrency
        }
    })
}

// =============================================================================
// Coordinator Harness
// =============================================================================

/// A running coordinator wired to the in-memory gateway
pub struct Harness {
    pub coordinator: Coordinator,
    pub events: EventStream,
    pub cache: Arc<EntityCache>,
    pub gateway: Arc<MockGateway>,
    pub server: GatewayServer,
}

impl Harness {
    /// Start `shard_count` shards admitted `concurrency` at a time
    ///
    /// # Panics
    /// Panics if the coordinator refuses to start
    pub fn start(config: &ClientConfig, shard_count: u32, concurrency: u32) -> Self {
        let cache = EntityCache::new_shared(CacheConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&cache)));
        let (gateway, server) = MockGateway::new();
        let coordinator_config = CoordinatorConfig::from_client(config, shard_count, concurrency, GATEWAY_URL);
        let (coordinator, events) = Coordinator::start(coordinator_config, gateway.clone(), dispatcher)
            .expect("coordinator starts");
        Self {
            coordinator,
            events,
            cache,
            gateway,
            server,
        }
    }

    /// Next event of any shard, skipping none
    ///
    /// # Panics
    /// Panics if no event arrives within a minute of virtual time
    pub async fn next_event(&mut self) -> shardline_core::ShardEvent {
        tokio::time::timeout(Duration::from_secs(60), self.events.recv())
            .await
            .expect("no event within 60s")
            .expect("event stream ended")
    }
}
