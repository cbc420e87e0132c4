//! Typed endpoints, as methods on [`crate::RestClient`]

mod channels;
mod gateway;
mod members;
mod users;

pub use channels::{CreateMessage, EditMessage, MessageReferenceBody};
pub use gateway::{GatewayBotInfo, SessionStartLimit};
pub use members::ModifyMember;
