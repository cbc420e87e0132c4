//! Shard lifecycle states

use std::fmt;

/// Lifecycle state of one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShardState {
    /// Not connected and not trying to
    #[default]
    Disconnected,
    /// Waiting for a handshake slot or opening the transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established; dispatches flow
    Ready,
    /// Connection lost, waiting out the backoff delay
    Reconnecting,
    /// Stopped permanently; will not be retried
    FatallyClosed,
}

impl ShardState {
    /// States between admission and READY/RESUMED
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHello | Self::Identifying | Self::Resuming
        )
    }

    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::FatallyClosed => "fatally_closed",
        }
    }
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
