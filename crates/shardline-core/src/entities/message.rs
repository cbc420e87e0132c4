//! Message entity - a chat message with its kind hoisted into a tagged enum

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::value_objects::Snowflake;

/// Wire message type codes that are authored by users
mod message_type {
    pub const DEFAULT: u8 = 0;
    pub const REPLY: u8 = 19;
    pub const CHAT_INPUT_COMMAND: u8 = 20;
    pub const CONTEXT_MENU_COMMAND: u8 = 23;
}

/// What produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain user message
    Default,
    /// User reply; the referenced message may have been deleted
    Reply { message_id: Option<Snowflake> },
    /// Response to an application command
    Command,
    /// Platform-generated notice (join, pin, boost, ...), by wire type code
    System(u8),
}

impl MessageKind {
    /// Classify a wire message type
    pub fn from_wire(type_code: u8, referenced: Option<Snowflake>) -> Self {
        match type_code {
            message_type::DEFAULT => Self::Default,
            message_type::REPLY => Self::Reply { message_id: referenced },
            message_type::CHAT_INPUT_COMMAND | message_type::CONTEXT_MENU_COMMAND => Self::Command,
            other => Self::System(other),
        }
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub size: u64,
    pub url: String,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author_id: Snowflake,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub kind: MessageKind,
    pub pinned: bool,
    pub tts: bool,
    pub mention_ids: Vec<Snowflake>,
    pub mention_role_ids: Vec<Snowflake>,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        channel_id: Snowflake,
        author_id: Snowflake,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author_id,
            content: content.into(),
            timestamp: id.created_at(),
            edited_timestamp: None,
            kind: MessageKind::Default,
            pinned: false,
            tts: false,
            mention_ids: Vec::new(),
            mention_role_ids: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    #[inline]
    pub fn mentions(&self, user_id: Snowflake) -> bool {
        self.mention_ids.contains(&user_id)
    }

    /// Merge a MESSAGE_UPDATE payload. Absent fields keep their cached values.
    pub fn apply_patch(&mut self, patch: &MessagePatch) {
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(edited) = patch.edited_timestamp {
            self.edited_timestamp = Some(edited);
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(mentions) = &patch.mentions {
            self.mention_ids = mentions.iter().map(|user| user.id).collect();
        }
        if let Some(roles) = &patch.mention_roles {
            self.mention_role_ids.clone_from(roles);
        }
        if let Some(attachments) = &patch.attachments {
            self.attachments.clone_from(attachments);
        }
    }
}

/// Message fields as they arrive in MESSAGE_UPDATE
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagePatch {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub mentions: Option<Vec<User>>,
    #[serde(default)]
    pub mention_roles: Option<Vec<Snowflake>>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}
