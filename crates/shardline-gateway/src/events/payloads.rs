//! Dispatch payload definitions
//!
//! Wire shapes that only appear in dispatch frames. Entity payloads shared
//! with the REST API live in `shardline_core::payloads`.

use serde::Deserialize;
use shardline_core::{
    ChannelPayload, Guild, MemberPatch, MemberPayload, Role, Snowflake, User, UserPatch,
    VoiceState,
};

// === Session Events ===

/// READY payload
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    #[serde(default)]
    pub v: u8,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}

/// The part of READY the shard keeps for resuming
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadySession {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

/// Guild stub in READY and GUILD_DELETE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    /// Absent when the current user was removed from the guild
    #[serde(default)]
    pub unavailable: Option<bool>,
}

// === Guild Events ===

/// GUILD_CREATE payload: the guild plus everything nested in it
#[derive(Debug, Clone, Deserialize)]
pub struct GuildCreatePayload {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default)]
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}

/// GUILD_ROLE_CREATE / GUILD_ROLE_UPDATE payload
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRolePayload {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// GUILD_ROLE_DELETE payload
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GuildRoleDeletePayload {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

// === Member Events ===

/// GUILD_MEMBER_ADD payload
#[derive(Debug, Clone, Deserialize)]
pub struct MemberAddPayload {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: MemberPayload,
}

/// GUILD_MEMBER_UPDATE payload
#[derive(Debug, Clone, Deserialize)]
pub struct MemberUpdatePayload {
    pub guild_id: Snowflake,
    pub user: User,
    #[serde(flatten)]
    pub patch: MemberPatch,
}

/// GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRemovePayload {
    pub guild_id: Snowflake,
    pub user: User,
}

/// GUILD_MEMBERS_CHUNK payload
#[derive(Debug, Clone, Deserialize)]
pub struct MembersChunkPayload {
    pub guild_id: Snowflake,
    pub members: Vec<MemberPayload>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    #[serde(default)]
    pub not_found: Vec<Snowflake>,
    #[serde(default)]
    pub nonce: Option<String>,
}

// === Message Events ===

/// MESSAGE_DELETE payload
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MessageDeletePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// MESSAGE_DELETE_BULK payload
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeleteBulkPayload {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

// === User Events ===

/// PRESENCE_UPDATE payload; `user` only carries the fields that changed
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceUpdatePayload {
    pub user: UserPatch,
    pub guild_id: Snowflake,
    pub status: String,
}

/// TYPING_START payload
#[derive(Debug, Clone, Deserialize)]
pub struct TypingStartPayload {
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix time in seconds
    pub timestamp: i64,
    #[serde(default)]
    pub member: Option<MemberPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_create_flattens_guild() {
        let payload: GuildCreatePayload = serde_json::from_value(serde_json::json!({
            "id": "100", "name": "Lounge", "owner_id": "1", "member_count": 2,
            "channels": [{"id": "101", "type": 0, "name": "general"}],
            "roles": [{"id": "100", "name": "@everyone", "permissions": "104324673"}],
            "members": [{"user": {"id": "1", "username": "one"}, "roles": []}],
            "voice_states": [],
            "presences": []
        }))
        .unwrap();
        assert_eq!(payload.guild.name, "Lounge");
        assert_eq!(payload.guild.member_count, Some(2));
        assert_eq!(payload.channels.len(), 1);
        assert_eq!(payload.roles[0].id, Snowflake::new(100));
        assert!(payload.members[0].user.is_some());
    }

    #[test]
    fn test_member_update_flattens_patch() {
        let payload: MemberUpdatePayload = serde_json::from_value(serde_json::json!({
            "guild_id": "100",
            "user": {"id": "1", "username": "one"},
            "roles": ["7"],
            "nick": null
        }))
        .unwrap();
        assert_eq!(payload.patch.roles, Some(vec![Snowflake::new(7)]));
        assert_eq!(payload.patch.nick, Some(None));
        assert_eq!(payload.patch.deaf, None);
    }

    #[test]
    fn test_guild_delete_stub() {
        let outage: UnavailableGuild =
            serde_json::from_value(serde_json::json!({"id": "5", "unavailable": true})).unwrap();
        assert_eq!(outage.unavailable, Some(true));
        let removed: UnavailableGuild = serde_json::from_value(serde_json::json!({"id": "5"})).unwrap();
        assert_eq!(removed.unavailable, None);
    }
}
