//! Error taxonomy shared by every layer of the client
//!
//! Each crate keeps its own error enum; the category says how the failure is
//! recovered and whether it reaches the caller.

use std::fmt;

/// How a failure is recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection dropped; recovered by reconnect/backoff
    Transport,
    /// Malformed or unexpected frame; dropped and logged
    Protocol,
    /// Server declared the session invalid; re-identify
    SessionInvalidated,
    /// Credential rejected or terminal close code; fatal
    Authentication,
    /// Throttled; recovered by waiting
    RateLimited,
    /// Non-retryable 4xx
    ClientRequest,
    /// 5xx; retried, then surfaced
    Server,
    /// The client is shutting down
    Shutdown,
    /// Invalid local configuration
    Configuration,
}

impl ErrorCategory {
    /// Failures that are worth another attempt
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport | Self::SessionInvalidated | Self::RateLimited | Self::Server
        )
    }

    /// Failures that end the affected component permanently
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication | Self::Configuration)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::SessionInvalidated => "session_invalidated",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::ClientRequest => "client_request",
            Self::Server => "server",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error type in the client
pub trait Categorized {
    fn category(&self) -> ErrorCategory;

    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
