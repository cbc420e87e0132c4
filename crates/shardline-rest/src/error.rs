//! REST error types

use serde::Deserialize;
use shardline_common::{Categorized, ErrorCategory};
use thiserror::Error;

/// Failures of the HTTP transport itself
#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to build request: {0}")]
    Build(String),

    #[error("HTTP error: {0}")]
    Other(String),
}

impl Categorized for HttpTransportError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Build(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Transport,
        }
    }
}

impl From<reqwest::Error> for HttpTransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Build(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Error body returned by the API
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
    /// Field-level validation detail, when present
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Decode an error body, falling back to the raw text as the message
    pub fn from_bytes(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self {
            message: String::from_utf8_lossy(body).into_owned(),
            ..Self::default()
        })
    }
}

/// Failures surfaced by the request pipeline
#[derive(Debug, Error)]
pub enum RestError {
    #[error("Request failed after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: HttpTransportError,
    },

    #[error("API error {status} (code {}): {}", .body.code, .body.message)]
    Api { status: u16, body: ApiErrorBody },

    #[error("Server error {status} after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Only with an explicit `max_rate_limit_retries`; otherwise 429s are
    /// waited out
    #[error("Still rate limited on {route} after {attempts} attempts")]
    RateLimited { route: String, attempts: u32 },

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response from {route}: {source}")]
    Decode {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("REST client is shutting down")]
    Shutdown,
}

impl RestError {
    /// HTTP status of the failed response, if one arrived
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the API reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl Categorized for RestError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { source, .. } => source.category(),
            Self::Api { status: 401, .. } => ErrorCategory::Authentication,
            Self::Api { .. } | Self::Encode(_) => ErrorCategory::ClientRequest,
            Self::Server { .. } => ErrorCategory::Server,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Decode { .. } => ErrorCategory::Protocol,
            Self::Shutdown => ErrorCategory::Shutdown,
        }
    }
}

pub type RestResult<T> = Result<T, RestError>;
