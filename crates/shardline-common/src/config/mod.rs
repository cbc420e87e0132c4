//! Configuration structs

mod backoff;
mod client_config;

pub use backoff::BackoffConfig;
pub use client_config::{
    CacheSettings, ClientConfig, ConfigError, Environment, FatalShardPolicy, GatewayConfig,
    RestConfig, ShardCount, ShardingConfig,
};
