//! Shard coordinator
//!
//! Handshake admission, shard supervision and the merged event stream.

mod gate;
mod manager;
mod stream;

pub use gate::{GateClosed, HandshakeGate, HandshakePermit};
pub use manager::{Coordinator, CoordinatorConfig};
pub use stream::EventStream;
