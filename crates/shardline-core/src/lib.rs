//! # shardline-core
//!
//! Domain layer: snowflake ids, gateway intents, the cached entity shapes,
//! the wire payloads they are built from, and the events a client emits.
//! This crate has no runtime or I/O dependencies.

pub mod entities;
pub mod events;
pub mod payloads;
pub mod serde_ext;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Attachment, Channel, ChannelKind, Guild, GuildPatch, Member, MemberPatch, Message,
    MessageKind, MessagePatch, PrivateChannel, Role, TextChannel, User, UserPatch, VoiceChannel,
    VoiceState,
};
pub use events::{Event, PresenceEvent, ReadyEvent, ShardEvent};
pub use payloads::{ChannelPayload, MemberPayload, MentionPayload, MessagePayload};
pub use value_objects::{GatewayIntents, Permissions, Snowflake, SnowflakeParseError};
