//! Wire payloads shared by the gateway and REST layers
//!
//! These mirror the JSON the platform sends. They are converted into the
//! cached entity shapes before being stored or handed to consumers.

mod channel;
mod member;
mod message;

pub use channel::ChannelPayload;
pub use member::MemberPayload;
pub use message::{MentionPayload, MessagePayload, MessageReference};
