//! # shardline
//!
//! Bot client: sharded gateway connections, an entity cache kept in step
//! with them, and a rate-limited REST client, wired together by [`Client`].
//!
//! ## Example
//!
//! ```ignore
//! use shardline::{ClientBuilder, Event};
//!
//! let client = ClientBuilder::from_env()?.build()?;
//! let mut events = client.start().await?;
//! while let Some(shard_event) = events.recv().await {
//!     if let Event::MessageCreate(message) = &shard_event.event {
//!         tracing::info!(content = %message.content, "Message");
//!     }
//! }
//! client.shutdown().await?;
//! ```

pub mod client;
pub mod error;

pub use client::{Client, ClientBuilder, ShardPlan};
pub use error::{ClientError, ClientResult};

// Re-export the component crates
pub use shardline_cache as cache;
pub use shardline_common as common;
pub use shardline_core as model;
pub use shardline_gateway as gateway;
pub use shardline_rest as rest;

pub use shardline_common::{ClientConfig, Token};
pub use shardline_core::{Event, ShardEvent, Snowflake};
pub use shardline_gateway::{EventStream, ShardCommand};
