use serde::{Deserialize, Serialize};

use crate::entities::{
    channel_type, Channel, ChannelKind, PrivateChannel, TextChannel, User, VoiceChannel,
};
use crate::value_objects::Snowflake;

/// Channel object as sent on the wire, with every kind's fields flattened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub last_message_id: Option<Snowflake>,
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,
    #[serde(default)]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub user_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<User>,
}

impl ChannelPayload {
    fn text(&self) -> TextChannel {
        TextChannel {
            topic: self.topic.clone(),
            nsfw: self.nsfw,
            last_message_id: self.last_message_id,
            rate_limit_per_user: self.rate_limit_per_user.unwrap_or(0),
        }
    }

    fn voice(&self) -> VoiceChannel {
        VoiceChannel {
            bitrate: self.bitrate.unwrap_or(0),
            user_limit: self.user_limit.unwrap_or(0),
        }
    }

    fn private(&self) -> PrivateChannel {
        PrivateChannel {
            recipient_ids: self.recipients.iter().map(|user| user.id).collect(),
            last_message_id: self.last_message_id,
        }
    }

    /// Convert into the cached channel shape.
    ///
    /// `guild_id` fills in the owner when the payload omits it, which happens
    /// for channels nested in GUILD_CREATE.
    pub fn to_channel(&self, guild_id: Option<Snowflake>) -> Channel {
        use channel_type as t;
        let kind = match self.kind {
            t::GUILD_TEXT => ChannelKind::Text(self.text()),
            t::GUILD_ANNOUNCEMENT => ChannelKind::Announcement(self.text()),
            t::GUILD_FORUM => ChannelKind::Forum(self.text()),
            t::GUILD_VOICE => ChannelKind::Voice(self.voice()),
            t::GUILD_STAGE_VOICE => ChannelKind::Stage(self.voice()),
            t::GUILD_CATEGORY => ChannelKind::Category,
            t::DM => ChannelKind::Direct(self.private()),
            t::GROUP_DM => ChannelKind::Group(self.private()),
            other => ChannelKind::Unknown(other),
        };
        let guild_id = if matches!(kind, ChannelKind::Direct(_) | ChannelKind::Group(_)) {
            None
        } else {
            self.guild_id.or(guild_id)
        };

        Channel {
            id: self.id,
            guild_id,
            name: self.name.clone(),
            position: self.position.unwrap_or(0),
            parent_id: self.parent_id,
            kind,
        }
    }
}

impl From<ChannelPayload> for Channel {
    fn from(payload: ChannelPayload) -> Self {
        payload.to_channel(None)
    }
}
