//! Per-shard configuration

use shardline_common::{BackoffConfig, ClientConfig, Token};
use shardline_core::GatewayIntents;
use std::time::Duration;

use crate::protocol::{IdentifyPayload, IdentifyProperties, PresenceUpdate, ResumePayload};

/// Default gateway URL when neither config nor discovery supplies one
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Everything one shard needs to connect and authenticate
#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub shard_id: u32,
    pub shard_count: u32,
    pub token: Token,
    pub intents: GatewayIntents,
    /// URL used for fresh identifies; resumes use the URL READY supplied
    pub gateway_url: String,
    pub api_version: u8,
    pub large_threshold: u32,
    /// Deadline from connect to READY/RESUMED
    pub handshake_timeout: Duration,
    pub backoff: BackoffConfig,
    /// Presence sent with IDENTIFY
    pub presence: Option<PresenceUpdate>,
    pub properties: IdentifyProperties,
}

impl ShardConfig {
    /// Build the config of shard `shard_id` of `shard_count`
    pub fn from_client(
        config: &ClientConfig,
        shard_id: u32,
        shard_count: u32,
        gateway_url: impl Into<String>,
    ) -> Self {
        Self {
            shard_id,
            shard_count,
            token: config.token.clone(),
            intents: config.intents,
            gateway_url: gateway_url.into(),
            api_version: config.api_version,
            large_threshold: config.gateway.large_threshold,
            handshake_timeout: config.gateway.hello_timeout,
            backoff: config.backoff,
            presence: None,
            properties: IdentifyProperties::default(),
        }
    }

    /// Same settings for another shard
    #[must_use]
    pub fn for_shard(&self, shard_id: u32) -> Self {
        Self {
            shard_id,
            ..self.clone()
        }
    }

    pub fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.as_str().to_string(),
            intents: self.intents,
            properties: self.properties.clone(),
            shard: [self.shard_id, self.shard_count],
            large_threshold: self.large_threshold,
            presence: self.presence.clone(),
        }
    }

    pub fn resume_payload(&self, session_id: &str, seq: u64) -> ResumePayload {
        ResumePayload {
            token: self.token.as_str().to_string(),
            session_id: session_id.to_string(),
            seq,
        }
    }
}
