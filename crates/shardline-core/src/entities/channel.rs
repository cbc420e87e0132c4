//! Channel entity - shared fields plus a closed set of channel kinds

use crate::value_objects::Snowflake;

/// Wire channel type codes
pub mod channel_type {
    pub const GUILD_TEXT: u8 = 0;
    pub const DM: u8 = 1;
    pub const GUILD_VOICE: u8 = 2;
    pub const GROUP_DM: u8 = 3;
    pub const GUILD_CATEGORY: u8 = 4;
    pub const GUILD_ANNOUNCEMENT: u8 = 5;
    pub const GUILD_STAGE_VOICE: u8 = 13;
    pub const GUILD_FORUM: u8 = 15;
}

/// Text-capable guild channel state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextChannel {
    pub topic: Option<String>,
    pub nsfw: bool,
    pub last_message_id: Option<Snowflake>,
    pub rate_limit_per_user: u32,
}

/// Voice-capable guild channel state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceChannel {
    pub bitrate: u32,
    pub user_limit: u32,
}

/// Direct or group conversation outside any guild
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrivateChannel {
    /// Recipients are kept by id and resolved through the user store.
    pub recipient_ids: Vec<Snowflake>,
    pub last_message_id: Option<Snowflake>,
}

/// The closed set of channel kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Text(TextChannel),
    Announcement(TextChannel),
    Forum(TextChannel),
    Voice(VoiceChannel),
    Stage(VoiceChannel),
    Category,
    Direct(PrivateChannel),
    Group(PrivateChannel),
    /// A type code this client does not model yet
    Unknown(u8),
}

impl ChannelKind {
    /// The wire type code
    pub fn type_code(&self) -> u8 {
        use channel_type as t;
        match self {
            Self::Text(_) => t::GUILD_TEXT,
            Self::Announcement(_) => t::GUILD_ANNOUNCEMENT,
            Self::Forum(_) => t::GUILD_FORUM,
            Self::Voice(_) => t::GUILD_VOICE,
            Self::Stage(_) => t::GUILD_STAGE_VOICE,
            Self::Category => t::GUILD_CATEGORY,
            Self::Direct(_) => t::DM,
            Self::Group(_) => t::GROUP_DM,
            Self::Unknown(code) => *code,
        }
    }
}

/// Channel entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub position: i32,
    pub parent_id: Option<Snowflake>,
    pub kind: ChannelKind,
}

impl Channel {
    /// Create a guild text channel
    pub fn new_text(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id: Some(guild_id),
            name: Some(name.into()),
            position: 0,
            parent_id: None,
            kind: ChannelKind::Text(TextChannel::default()),
        }
    }

    /// Create a DM channel with a single recipient
    pub fn new_dm(id: Snowflake, recipient_id: Snowflake) -> Self {
        Self {
            id,
            guild_id: None,
            name: None,
            position: 0,
            parent_id: None,
            kind: ChannelKind::Direct(PrivateChannel {
                recipient_ids: vec![recipient_id],
                last_message_id: None,
            }),
        }
    }

    /// Channels outside any guild (DMs and group DMs)
    #[inline]
    pub fn is_private(&self) -> bool {
        matches!(self.kind, ChannelKind::Direct(_) | ChannelKind::Group(_))
    }

    /// Whether messages can be posted in this channel
    #[inline]
    pub fn is_text_based(&self) -> bool {
        matches!(
            self.kind,
            ChannelKind::Text(_)
                | ChannelKind::Announcement(_)
                | ChannelKind::Direct(_)
                | ChannelKind::Group(_)
        )
    }

    pub fn topic(&self) -> Option<&str> {
        match &self.kind {
            ChannelKind::Text(text) | ChannelKind::Announcement(text) | ChannelKind::Forum(text) => {
                text.topic.as_deref()
            }
            _ => None,
        }
    }

    pub fn last_message_id(&self) -> Option<Snowflake> {
        match &self.kind {
            ChannelKind::Text(text) | ChannelKind::Announcement(text) | ChannelKind::Forum(text) => {
                text.last_message_id
            }
            ChannelKind::Direct(private) | ChannelKind::Group(private) => private.last_message_id,
            _ => None,
        }
    }

    /// Record a newly created message. Returns false for kinds that do not track it.
    pub fn set_last_message_id(&mut self, message_id: Snowflake) -> bool {
        match &mut self.kind {
            ChannelKind::Text(text) | ChannelKind::Announcement(text) | ChannelKind::Forum(text) => {
                text.last_message_id = Some(message_id);
                true
            }
            ChannelKind::Direct(private) | ChannelKind::Group(private) => {
                private.last_message_id = Some(message_id);
                true
            }
            _ => false,
        }
    }

    /// Get display name (channel name or fallback for DMs)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Direct Message")
    }
}
