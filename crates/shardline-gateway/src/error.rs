//! Gateway error types

use shardline_common::{Categorized, ErrorCategory};
use thiserror::Error;

use crate::protocol::{CloseCode, CloseDisposition};

/// Failures of the underlying connection
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Non-text frame received")]
    UnsupportedFrame,
}

impl Categorized for TransportError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedFrame => ErrorCategory::Protocol,
            _ => ErrorCategory::Transport,
        }
    }
}

/// Why a shard stopped or a session attempt ended
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed frame: {0}")]
    Protocol(String),

    #[error("Session invalidated (resumable: {resumable})")]
    SessionInvalidated { resumable: bool },

    #[error("Gateway closed the connection: {0}")]
    Closed(CloseCode),

    #[error("No Hello within {0:?}")]
    HelloTimeout(std::time::Duration),

    #[error("Shutting down")]
    Shutdown,
}

impl Categorized for GatewayError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(err) => err.category(),
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::SessionInvalidated { .. } => ErrorCategory::SessionInvalidated,
            Self::Closed(code) if code.is_authentication() => ErrorCategory::Authentication,
            Self::Closed(code) => match code.disposition() {
                CloseDisposition::Fatal => ErrorCategory::Configuration,
                CloseDisposition::Reidentify => ErrorCategory::SessionInvalidated,
                CloseDisposition::Resume => ErrorCategory::Transport,
            },
            Self::HelloTimeout(_) => ErrorCategory::Transport,
            Self::Shutdown => ErrorCategory::Shutdown,
        }
    }
}

/// A dispatch payload that could not be decoded
#[derive(Debug, Error)]
#[error("Failed to decode {event_type}: {source}")]
pub struct DispatchError {
    pub event_type: &'static str,
    #[source]
    pub source: serde_json::Error,
}

impl Categorized for DispatchError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Protocol
    }
}

/// Coordinator failures surfaced to the owning process
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Shard {shard_id} failed: {reason}")]
    ShardFailed {
        shard_id: u32,
        close_code: Option<u16>,
        reason: String,
    },

    #[error("Shard {0} is not running")]
    ShardUnavailable(u32),

    #[error("No shards configured")]
    NoShards,

    #[error("Coordinator is shutting down")]
    Shutdown,
}

impl Categorized for CoordinatorError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::ShardFailed { close_code, .. } => close_code
                .and_then(CloseCode::from_u16)
                .map_or(ErrorCategory::Transport, |code| {
                    GatewayError::Closed(code).category()
                }),
            Self::ShardUnavailable(_) => ErrorCategory::Transport,
            Self::NoShards => ErrorCategory::Configuration,
            Self::Shutdown => ErrorCategory::Shutdown,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
