//! # shardline-common
//!
//! Shared utilities including configuration, the bot credential, the error
//! taxonomy, backoff policy, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::Token;
pub use config::{
    BackoffConfig, CacheSettings, ClientConfig, ConfigError, Environment, FatalShardPolicy,
    GatewayConfig, RestConfig, ShardCount, ShardingConfig,
};
pub use error::{Categorized, ErrorCategory};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
