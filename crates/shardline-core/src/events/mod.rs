//! Events emitted to consumers of the client

mod event;

pub use event::{Event, PresenceEvent, ReadyEvent, ShardEvent};
