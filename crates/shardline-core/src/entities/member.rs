//! Member entity - a user's membership in one guild
//!
//! A member refers to its user by id only; the user record itself is shared
//! across guilds and lives in the flat user store.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::serde_ext::double_option;
use crate::value_objects::Snowflake;

/// Guild member entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub role_ids: Vec<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
    pub premium_since: Option<DateTime<Utc>>,
    pub deaf: bool,
    pub mute: bool,
    pub pending: bool,
}

impl Member {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nick: None,
            role_ids: Vec::new(),
            joined_at: None,
            premium_since: None,
            deaf: false,
            mute: false,
            pending: false,
        }
    }

    /// Get display name (nickname if set, otherwise fallback)
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }

    pub fn add_role(&mut self, role_id: Snowflake) {
        if !self.has_role(role_id) {
            self.role_ids.push(role_id);
        }
    }

    pub fn remove_role(&mut self, role_id: Snowflake) {
        self.role_ids.retain(|&id| id != role_id);
    }

    /// Merge a GUILD_MEMBER_UPDATE payload. Absent fields keep their cached values.
    pub fn apply_patch(&mut self, patch: &MemberPatch) {
        if let Some(nick) = &patch.nick {
            self.nick.clone_from(nick);
        }
        if let Some(roles) = &patch.roles {
            self.role_ids.clone_from(roles);
        }
        if let Some(joined_at) = patch.joined_at {
            self.joined_at = Some(joined_at);
        }
        if let Some(premium_since) = patch.premium_since {
            self.premium_since = premium_since;
        }
        if let Some(deaf) = patch.deaf {
            self.deaf = deaf;
        }
        if let Some(mute) = patch.mute {
            self.mute = mute;
        }
        if let Some(pending) = patch.pending {
            self.pending = pending;
        }
    }
}

/// Member fields as they arrive in GUILD_MEMBER_UPDATE (user handled separately)
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MemberPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub nick: Option<Option<String>>,
    #[serde(default)]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub premium_since: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub deaf: Option<bool>,
    #[serde(default)]
    pub mute: Option<bool>,
    #[serde(default)]
    pub pending: Option<bool>,
}
