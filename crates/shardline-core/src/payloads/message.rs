use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MemberPayload;
use crate::entities::{Attachment, Message, MessageKind, User};
use crate::value_objects::Snowflake;

/// A mentioned user, with its guild member when sent from a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionPayload {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub member: Option<MemberPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// Message object as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    /// Author's member, without the nested user
    #[serde(default)]
    pub member: Option<MemberPayload>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mentions: Vec<MentionPayload>,
    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
}

impl MessagePayload {
    /// Convert into the cached message shape
    pub fn to_message(&self) -> Message {
        let referenced = self.message_reference.as_ref().and_then(|r| r.message_id);
        Message {
            id: self.id,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            author_id: self.author.id,
            content: self.content.clone(),
            timestamp: self.timestamp,
            edited_timestamp: self.edited_timestamp,
            kind: MessageKind::from_wire(self.kind, referenced),
            pinned: self.pinned,
            tts: self.tts,
            mention_ids: self.mentions.iter().map(|m| m.user.id).collect(),
            mention_role_ids: self.mention_roles.clone(),
            attachments: self.attachments.clone(),
        }
    }
}
