//! Shard: one gateway connection
//!
//! ```text
//! Disconnected → Connecting → AwaitingHello → Identifying | Resuming → Ready
//!                    ↑                                                  │
//!                    └──────────────── Reconnecting ←───────────────────┘
//!                                          │
//!                                          └→ FatallyClosed
//! ```

mod config;
mod heartbeat;
mod runner;
mod session;
mod state;

pub use config::{ShardConfig, DEFAULT_GATEWAY_URL};
pub use runner::{Shard, ShardCommand, ShardContext, ShardExit, ShardHandle};
pub use session::ShardSession;
pub use state::ShardState;
