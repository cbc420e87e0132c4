use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Member, User};
use crate::value_objects::Snowflake;

/// Guild member object as sent on the wire.
///
/// `user` is absent when the member is embedded in a message author or mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub premium_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub pending: bool,
}

impl MemberPayload {
    /// Build the cached member for a known guild and user
    pub fn to_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Member {
        Member {
            guild_id: self.guild_id.unwrap_or(guild_id),
            user_id,
            nick: self.nick.clone(),
            role_ids: self.roles.clone(),
            joined_at: self.joined_at,
            premium_since: self.premium_since,
            deaf: self.deaf,
            mute: self.mute,
            pending: self.pending,
        }
    }

    /// Split into the member and its embedded user, if the payload has one.
    pub fn into_parts(self, guild_id: Snowflake) -> Option<(Member, User)> {
        let user = self.user.clone()?;
        let member = self.to_member(guild_id, user.id);
        Some((member, user))
    }
}
