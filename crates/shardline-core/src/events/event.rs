//! Client events - one value per cache mutation, delivered to consumers
//!
//! Update and delete events carry the state the cache held before the change
//! when it was known. `None` means the entity was not cached, not that it
//! did not exist.

use chrono::{DateTime, Utc};

use crate::entities::{Channel, Guild, Member, Message, Role, User, VoiceState};
use crate::value_objects::Snowflake;

/// Session established by IDENTIFY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    pub user: User,
    pub session_id: String,
    /// Guilds the shard will stream GUILD_CREATE for
    pub guild_ids: Vec<Snowflake>,
}

/// A user's presence changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub status: String,
    /// Cached user after the patch was merged
    pub user: Option<User>,
}

/// All events a client emits
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // =========================================================================
    // Session Events
    // =========================================================================
    Ready(ReadyEvent),
    Resumed,
    /// A shard stopped permanently
    ShardFailed {
        close_code: Option<u16>,
        reason: String,
    },

    // =========================================================================
    // Guild Events
    // =========================================================================
    /// A guild from READY finished streaming in, or came back from an outage
    GuildAvailable(Guild),
    /// The current user joined a new guild
    GuildJoined(Guild),
    GuildUpdate {
        old: Option<Guild>,
        new: Guild,
    },
    /// The guild went offline; it will come back with GUILD_CREATE
    GuildUnavailable {
        guild_id: Snowflake,
        old: Option<Guild>,
    },
    /// The current user left or was removed from the guild
    GuildLeft {
        guild_id: Snowflake,
        old: Option<Guild>,
    },

    // =========================================================================
    // Channel Events
    // =========================================================================
    ChannelCreate(Channel),
    ChannelUpdate {
        old: Option<Channel>,
        new: Channel,
    },
    ChannelDelete(Channel),

    // =========================================================================
    // Role Events
    // =========================================================================
    RoleCreate {
        guild_id: Snowflake,
        role: Role,
    },
    RoleUpdate {
        guild_id: Snowflake,
        old: Option<Role>,
        new: Role,
    },
    RoleDelete {
        guild_id: Snowflake,
        role_id: Snowflake,
        old: Option<Role>,
    },

    // =========================================================================
    // Member Events
    // =========================================================================
    MemberAdd {
        member: Member,
        user: User,
    },
    MemberUpdate {
        old: Option<Member>,
        new: Member,
    },
    MemberRemove {
        guild_id: Snowflake,
        user: User,
        old: Option<Member>,
    },
    MembersChunk {
        guild_id: Snowflake,
        chunk_index: u32,
        chunk_count: u32,
        member_ids: Vec<Snowflake>,
        not_found: Vec<Snowflake>,
        nonce: Option<String>,
    },

    // =========================================================================
    // Message Events
    // =========================================================================
    MessageCreate(Message),
    MessageUpdate {
        channel_id: Snowflake,
        message_id: Snowflake,
        guild_id: Option<Snowflake>,
        old: Option<Message>,
        /// Merged message, when the original was cached
        new: Option<Message>,
    },
    MessageDelete {
        channel_id: Snowflake,
        message_id: Snowflake,
        guild_id: Option<Snowflake>,
        old: Option<Message>,
    },
    MessageDeleteBulk {
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
        message_ids: Vec<Snowflake>,
        old: Vec<Message>,
    },

    // =========================================================================
    // User Events
    // =========================================================================
    UserUpdate {
        old: Option<User>,
        new: User,
    },
    PresenceUpdate(PresenceEvent),
    VoiceStateUpdate {
        old: Option<VoiceState>,
        new: VoiceState,
    },
    TypingStart {
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
        user_id: Snowflake,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "READY",
            Self::Resumed => "RESUMED",
            Self::ShardFailed { .. } => "SHARD_FAILED",
            Self::GuildAvailable(_) => "GUILD_AVAILABLE",
            Self::GuildJoined(_) => "GUILD_JOINED",
            Self::GuildUpdate { .. } => "GUILD_UPDATE",
            Self::GuildUnavailable { .. } => "GUILD_UNAVAILABLE",
            Self::GuildLeft { .. } => "GUILD_LEFT",
            Self::ChannelCreate(_) => "CHANNEL_CREATE",
            Self::ChannelUpdate { .. } => "CHANNEL_UPDATE",
            Self::ChannelDelete(_) => "CHANNEL_DELETE",
            Self::RoleCreate { .. } => "ROLE_CREATE",
            Self::RoleUpdate { .. } => "ROLE_UPDATE",
            Self::RoleDelete { .. } => "ROLE_DELETE",
            Self::MemberAdd { .. } => "MEMBER_ADD",
            Self::MemberUpdate { .. } => "MEMBER_UPDATE",
            Self::MemberRemove { .. } => "MEMBER_REMOVE",
            Self::MembersChunk { .. } => "MEMBERS_CHUNK",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate { .. } => "MESSAGE_UPDATE",
            Self::MessageDelete { .. } => "MESSAGE_DELETE",
            Self::MessageDeleteBulk { .. } => "MESSAGE_DELETE_BULK",
            Self::UserUpdate { .. } => "USER_UPDATE",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
            Self::VoiceStateUpdate { .. } => "VOICE_STATE_UPDATE",
            Self::TypingStart { .. } => "TYPING_START",
        }
    }

    /// Guild the event concerns, if any
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::GuildAvailable(guild) | Self::GuildJoined(guild) => Some(guild.id),
            Self::GuildUpdate { new, .. } => Some(new.id),
            Self::GuildUnavailable { guild_id, .. }
            | Self::GuildLeft { guild_id, .. }
            | Self::RoleCreate { guild_id, .. }
            | Self::RoleUpdate { guild_id, .. }
            | Self::RoleDelete { guild_id, .. }
            | Self::MemberRemove { guild_id, .. }
            | Self::MembersChunk { guild_id, .. } => Some(*guild_id),
            Self::ChannelCreate(channel) | Self::ChannelDelete(channel) => channel.guild_id,
            Self::ChannelUpdate { new, .. } => new.guild_id,
            Self::MemberAdd { member, .. } => Some(member.guild_id),
            Self::MemberUpdate { new, .. } => Some(new.guild_id),
            Self::MessageCreate(message) => message.guild_id,
            Self::MessageUpdate { guild_id, .. }
            | Self::MessageDelete { guild_id, .. }
            | Self::MessageDeleteBulk { guild_id, .. }
            | Self::TypingStart { guild_id, .. } => *guild_id,
            Self::PresenceUpdate(presence) => Some(presence.guild_id),
            Self::VoiceStateUpdate { new, .. } => new.guild_id,
            Self::Ready(_) | Self::Resumed | Self::ShardFailed { .. } | Self::UserUpdate { .. } => None,
        }
    }
}

/// An event tagged with the shard that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ShardEvent {
    pub shard_id: u32,
    pub event: Event,
}

impl ShardEvent {
    pub fn new(shard_id: u32, event: Event) -> Self {
        Self { shard_id, event }
    }
}
