//! Dispatch event definitions
//!
//! Event type names and the payload shapes of dispatch frames.

mod event_types;
mod payloads;

pub use event_types::EventType;
pub use payloads::{
    GuildCreatePayload, GuildRoleDeletePayload, GuildRolePayload, MemberAddPayload, MemberRemovePayload,
    MemberUpdatePayload, MembersChunkPayload, MessageDeleteBulkPayload, MessageDeletePayload,
    PresenceUpdatePayload, ReadyPayload, ReadySession, TypingStartPayload, UnavailableGuild,
};
