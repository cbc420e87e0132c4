//! Client error type

use shardline_cache::CacheError;
use shardline_common::{Categorized, ConfigError, ErrorCategory};
use shardline_gateway::CoordinatorError;
use shardline_rest::RestError;
use thiserror::Error;

/// Errors surfaced by [`crate::Client`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Gateway(#[from] CoordinatorError),

    #[error("Client is already running")]
    AlreadyStarted,

    #[error("Client has not been started")]
    NotStarted,
}

impl Categorized for ClientError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::Cache(_) | Self::AlreadyStarted | Self::NotStarted => {
                ErrorCategory::Configuration
            }
            Self::Rest(err) => err.category(),
            Self::Gateway(err) => err.category(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shardline_rest::ApiErrorBody;

    #[test]
    fn test_categories_pass_through() {
        let err = ClientError::from(RestError::Api {
            status: 403,
            body: ApiErrorBody::default(),
        });
        assert_eq!(err.category(), ErrorCategory::ClientRequest);

        let err = ClientError::from(CoordinatorError::ShardFailed {
            shard_id: 1,
            close_code: Some(4014),
            reason: "Disallowed intents".to_string(),
        });
        assert!(err.category().is_fatal());

        let err = ClientError::from(ConfigError::MissingVar("SHARDLINE_TOKEN"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
