//! Value objects - immutable types that represent protocol concepts

mod intents;
mod permissions;
mod snowflake;

pub use intents::GatewayIntents;
pub use permissions::Permissions;
pub use snowflake::{Snowflake, SnowflakeParseError};
