//! # shardline-gateway
//!
//! Gateway client: the per-connection shard state machine, the dispatcher
//! that keeps the entity cache in step with dispatches, and the coordinator
//! that runs many shards under one handshake budget.
//!
//! ## Architecture
//!
//! ```text
//! transport ─→ Shard (handshake, heartbeat, resume) ─→ Dispatcher ─→ EntityCache
//!                                                          │
//!                                                          ↓
//!                                  Coordinator ─→ EventStream ─→ consumer
//! ```

pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod protocol;
pub mod shard;
pub mod transport;

pub use coordinator::{Coordinator, CoordinatorConfig, EventStream, HandshakeGate};
pub use dispatcher::Dispatcher;
pub use error::{CoordinatorError, DispatchError, GatewayError, GatewayResult, TransportError};
pub use protocol::{CloseCode, CloseDisposition, GatewayFrame, OpCode};
pub use shard::{Shard, ShardCommand, ShardConfig, ShardContext, ShardExit, ShardHandle, ShardState};
pub use transport::{GatewayConnection, GatewayTransport, Inbound, WsTransport};
