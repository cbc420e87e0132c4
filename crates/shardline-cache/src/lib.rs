//! # shardline-cache
//!
//! In-memory store of the entities a gateway session streams in.
//!
//! ## Features
//!
//! - **Guild entries**: channels, roles, members, voice states and messages
//!   are nested under their guild and evicted with it
//! - **Shared users**: one copy per user, kept while any guild, private
//!   channel or pin refers to it
//! - **Message rings**: a bounded number of recent messages per channel
//! - **Kind toggles**: disabled entity kinds are never populated
//!
//! ## Example
//!
//! ```ignore
//! use shardline_cache::{CacheConfig, CacheKinds, EntityCache};
//!
//! let cache = EntityCache::new(CacheConfig::with_kinds(
//!     CacheKinds::all() - CacheKinds::MESSAGES,
//! ));
//! if let Some(members) = cache.guild_members(guild_id) {
//!     tracing::info!(count = members.len(), "Members cached");
//! }
//! ```

pub mod config;
mod entry;
pub mod store;
mod users;

pub use config::{CacheConfig, CacheError, CacheKinds};
pub use store::{CacheStats, EntityCache, GuildSnapshot};
pub use users::UserRef;
