//! Client configuration
//!
//! Loads configuration from `SHARDLINE_*` environment variables (and a `.env`
//! file when present). Every optional value has a default function below.

use serde::{Deserialize, Serialize};
use shardline_core::GatewayIntents;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::backoff::{default_base_ms, default_jitter, default_max_ms, BackoffConfig};
use crate::auth::Token;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub env: Environment,
    pub token: Token,
    pub intents: GatewayIntents,
    /// API version used for both the gateway and REST
    pub api_version: u8,
    pub sharding: ShardingConfig,
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
    pub cache: CacheSettings,
    pub backoff: BackoffConfig,
    /// Bounded wait for shards to close gracefully on shutdown
    pub shutdown_timeout: Duration,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(()),
        }
    }
}

/// Number of shards to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardCount {
    /// Ask the platform for its recommended count at startup
    #[default]
    Auto,
    Fixed(u32),
}

impl FromStr for ShardCount {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self::Fixed(n)),
            _ => Err(()),
        }
    }
}

/// What the coordinator does when one shard fails permanently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FatalShardPolicy {
    /// Stop every shard and return the error to the owner
    #[default]
    ShutdownAll,
    /// Report the failure and keep the remaining shards running
    Continue,
}

impl FromStr for FatalShardPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shutdown" | "shutdown_all" => Ok(Self::ShutdownAll),
            "continue" => Ok(Self::Continue),
            _ => Err(()),
        }
    }
}

/// Shard coordination settings
#[derive(Debug, Clone)]
pub struct ShardingConfig {
    pub shard_count: ShardCount,
    /// Shards allowed mid-handshake at once; `None` uses the platform's value
    pub concurrency: Option<u32>,
    /// Minimum delay between two handshake admissions
    pub identify_interval: Duration,
    pub on_fatal: FatalShardPolicy,
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Overrides the URL reported by the platform
    pub url: Option<String>,
    /// Member count above which a guild is sent without offline members
    pub large_threshold: u32,
    /// Capacity of the consumer event queue
    pub event_buffer: usize,
    /// How long to wait for HELLO after the transport opens
    pub hello_timeout: Duration,
}

/// REST pipeline settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub api_base_url: String,
    /// Attempts after the first for 5xx and transport failures
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Platform-wide request ceiling per second
    pub global_limit_per_second: u32,
    /// 429s one request may absorb before it fails; unbounded when unset
    pub max_rate_limit_retries: Option<u32>,
}

/// Cache settings, resolved into cache kinds by the cache crate
#[derive(Debug, Clone, Default)]
pub struct CacheSettings {
    /// Kind names to keep out of the cache (e.g. "members", "messages")
    pub disabled: Vec<String>,
    /// Messages kept per channel
    pub message_capacity: usize,
}

// Default value functions
fn default_api_version() -> u8 {
    10
}

fn default_identify_interval_ms() -> u64 {
    5_000
}

fn default_large_threshold() -> u32 {
    250
}

fn default_event_buffer() -> usize {
    1024
}

fn default_hello_timeout_ms() -> u64 {
    20_000
}

fn default_api_base_url() -> String {
    "https://discord.com/api".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_global_limit() -> u32 {
    50
}

fn default_message_capacity() -> usize {
    100
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl ClientConfig {
    /// Configuration with every optional value at its default
    pub fn new(token: Token) -> Self {
        Self {
            env: Environment::default(),
            token,
            intents: GatewayIntents::default(),
            api_version: default_api_version(),
            sharding: ShardingConfig {
                shard_count: ShardCount::Auto,
                concurrency: None,
                identify_interval: Duration::from_millis(default_identify_interval_ms()),
                on_fatal: FatalShardPolicy::default(),
            },
            gateway: GatewayConfig {
                url: None,
                large_threshold: default_large_threshold(),
                event_buffer: default_event_buffer(),
                hello_timeout: Duration::from_millis(default_hello_timeout_ms()),
            },
            rest: RestConfig {
                api_base_url: default_api_base_url(),
                max_retries: default_max_retries(),
                request_timeout: Duration::from_millis(default_request_timeout_ms()),
                global_limit_per_second: default_global_limit(),
                max_rate_limit_retries: None,
            },
            cache: CacheSettings {
                disabled: Vec::new(),
                message_capacity: default_message_capacity(),
            },
            backoff: BackoffConfig::default(),
            shutdown_timeout: Duration::from_millis(default_shutdown_timeout_ms()),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `SHARDLINE_TOKEN` is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let token = Token::new(
            vars.get("SHARDLINE_TOKEN")
                .ok_or(ConfigError::MissingVar("SHARDLINE_TOKEN"))?,
        );
        if token.is_empty() {
            return Err(ConfigError::InvalidValue("SHARDLINE_TOKEN", "empty".to_string()));
        }

        let intents = match vars.get("SHARDLINE_INTENTS") {
            Some(raw) => GatewayIntents::parse(&raw)
                .ok_or(ConfigError::InvalidValue("SHARDLINE_INTENTS", raw))?,
            None => GatewayIntents::default(),
        };

        let backoff = BackoffConfig {
            base: Duration::from_millis(vars.parse("SHARDLINE_BACKOFF_BASE_MS", default_base_ms)?),
            max: Duration::from_millis(vars.parse("SHARDLINE_BACKOFF_MAX_MS", default_max_ms)?),
            multiplier: 2.0,
            jitter: vars.parse("SHARDLINE_BACKOFF_JITTER", default_jitter)?,
        };
        if !(0.0..=1.0).contains(&backoff.jitter) {
            return Err(ConfigError::InvalidValue(
                "SHARDLINE_BACKOFF_JITTER",
                backoff.jitter.to_string(),
            ));
        }

        Ok(Self {
            env: vars.parse("SHARDLINE_ENV", Environment::default)?,
            token,
            intents,
            api_version: vars.parse("SHARDLINE_API_VERSION", default_api_version)?,
            sharding: ShardingConfig {
                shard_count: vars.parse("SHARDLINE_SHARD_COUNT", ShardCount::default)?,
                concurrency: vars.parse_opt("SHARDLINE_SHARD_CONCURRENCY")?,
                identify_interval: Duration::from_millis(
                    vars.parse("SHARDLINE_IDENTIFY_INTERVAL_MS", default_identify_interval_ms)?,
                ),
                on_fatal: vars.parse("SHARDLINE_ON_FATAL_SHARD", FatalShardPolicy::default)?,
            },
            gateway: GatewayConfig {
                url: vars.get("SHARDLINE_GATEWAY_URL"),
                large_threshold: vars.parse("SHARDLINE_LARGE_THRESHOLD", default_large_threshold)?,
                event_buffer: vars.parse("SHARDLINE_EVENT_BUFFER", default_event_buffer)?,
                hello_timeout: Duration::from_millis(
                    vars.parse("SHARDLINE_HELLO_TIMEOUT_MS", default_hello_timeout_ms)?,
                ),
            },
            rest: RestConfig {
                api_base_url: vars
                    .get("SHARDLINE_API_BASE_URL")
                    .unwrap_or_else(default_api_base_url),
                max_retries: vars.parse("SHARDLINE_REST_MAX_RETRIES", default_max_retries)?,
                request_timeout: Duration::from_millis(
                    vars.parse("SHARDLINE_REST_TIMEOUT_MS", default_request_timeout_ms)?,
                ),
                global_limit_per_second: vars
                    .parse("SHARDLINE_GLOBAL_RATE_LIMIT", default_global_limit)?,
                max_rate_limit_retries: vars.parse_opt("SHARDLINE_REST_MAX_RATE_LIMIT_RETRIES")?,
            },
            cache: CacheSettings {
                disabled: vars
                    .get("SHARDLINE_CACHE_DISABLED")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_lowercase)
                            .collect()
                    })
                    .unwrap_or_default(),
                message_capacity: vars
                    .parse("SHARDLINE_MESSAGE_CACHE_SIZE", default_message_capacity)?,
            },
            backoff,
            shutdown_timeout: Duration::from_millis(
                vars.parse("SHARDLINE_SHUTDOWN_TIMEOUT_MS", default_shutdown_timeout_ms)?,
            ),
        })
    }
}

/// Typed access to the variable lookup
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        default: impl FnOnce() -> T,
    ) -> Result<T, ConfigError> {
        Ok(self.parse_opt(key)?.unwrap_or_else(default))
    }

    fn parse_opt<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(None),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
