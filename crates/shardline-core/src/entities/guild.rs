//! Guild entity - the top-level metadata of a server
//!
//! Nested entities (channels, roles, members, voice states) are not stored
//! here; the cache owns them beneath the guild's entry.

use serde::{Deserialize, Serialize};

use crate::serde_ext::double_option;
use crate::value_objects::Snowflake;

/// Guild (server) metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub large: bool,
}

impl Guild {
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            description: None,
            owner_id,
            member_count: None,
            large: false,
        }
    }

    /// Check if a user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// Shard that owns this guild
    #[inline]
    pub fn shard_index(&self, shard_count: u32) -> u32 {
        self.id.shard_index(shard_count)
    }

    /// Merge a GUILD_UPDATE payload. Absent fields keep their cached values.
    pub fn apply_patch(&mut self, patch: &GuildPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(icon) = &patch.icon {
            self.icon.clone_from(icon);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(owner_id) = patch.owner_id {
            self.owner_id = owner_id;
        }
        if let Some(member_count) = patch.member_count {
            self.member_count = Some(member_count);
        }
    }
}

/// Guild fields as they arrive in GUILD_UPDATE
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct GuildPatch {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
}

impl GuildPatch {
    /// Build a guild from the patch alone, when the cache has no prior state.
    pub fn to_guild(&self) -> Option<Guild> {
        Some(Guild {
            id: self.id,
            name: self.name.clone()?,
            icon: self.icon.clone().flatten(),
            description: self.description.clone().flatten(),
            owner_id: self.owner_id?,
            member_count: self.member_count,
            large: false,
        })
    }
}
