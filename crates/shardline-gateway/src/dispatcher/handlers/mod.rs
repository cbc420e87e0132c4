//! Per-event handlers
//!
//! Each handler reads the cached state, merges the payload in, writes it
//! back, and builds the event carrying old and new state.

mod channel;
mod guild;
mod member;
mod message;
mod ready;
mod role;
mod user;

pub use channel::ChannelHandler;
pub use guild::GuildHandler;
pub use member::MemberHandler;
pub use message::MessageHandler;
pub use ready::ReadyHandler;
pub use role::RoleHandler;
pub use user::UserHandler;
