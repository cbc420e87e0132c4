//! User, presence, voice and typing handlers

use chrono::DateTime;
use serde_json::Value;
use shardline_core::{Event, PresenceEvent, User, VoiceState};

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::{EventType, PresenceUpdatePayload, TypingStartPayload};

/// Handles user-scoped dispatches
pub struct UserHandler;

impl UserHandler {
    /// The current user changed
    pub fn user_update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let new: User = DispatchContext::decode(EventType::UserUpdate, data)?;
        let old = ctx.cache.set_current_user(new.clone());
        Ok(Some(Event::UserUpdate { old, new }))
    }

    /// Only the user fields that changed are present; they are merged onto
    /// the shared user record.
    pub fn presence_update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: PresenceUpdatePayload =
            DispatchContext::decode(EventType::PresenceUpdate, data)?;
        let user_id = payload.user.id;
        let user = ctx.cache.patch_user(&payload.user).map(|(_, new)| new);

        Ok(Some(Event::PresenceUpdate(PresenceEvent {
            guild_id: payload.guild_id,
            user_id,
            status: payload.status,
            user,
        })))
    }

    /// A state without a channel means the user left voice
    pub fn voice_state_update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let new: VoiceState = DispatchContext::decode(EventType::VoiceStateUpdate, data)?;
        let old = ctx.cache.upsert_voice_state(new.clone());
        Ok(Some(Event::VoiceStateUpdate { old, new }))
    }

    pub fn typing_start(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: TypingStartPayload = DispatchContext::decode(EventType::TypingStart, data)?;

        if let (Some(guild_id), Some(member)) = (payload.guild_id, payload.member) {
            if let Some((member, user)) = member.into_parts(guild_id) {
                ctx.cache.insert_member_if_absent(member, user);
            }
        }

        Ok(Some(Event::TypingStart {
            channel_id: payload.channel_id,
            guild_id: payload.guild_id,
            user_id: payload.user_id,
            timestamp: DateTime::from_timestamp(payload.timestamp, 0).unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatcher::tests::{dispatcher, guild_create};
    use serde_json::json;
    use shardline_core::{Event, Snowflake};

    #[test]
    fn test_presence_merges_user_patch() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(0, 1, "GUILD_CREATE", guild_create(100)).unwrap();

        let event = dispatcher
            .dispatch(
                0,
                1,
                "PRESENCE_UPDATE",
                json!({"user": {"id": "1", "avatar": "abc"}, "guild_id": "100", "status": "idle"}),
            )
            .unwrap();
        let Some(Event::PresenceUpdate(presence)) = event else {
            panic!("expected PresenceUpdate, got {event:?}");
        };
        assert_eq!(presence.status, "idle");
        let user = presence.user.unwrap();
        assert_eq!(user.username, "owner");
        assert_eq!(user.avatar.as_deref(), Some("abc"));
    }

    #[test]
    fn test_presence_for_untracked_user() {
        let dispatcher = dispatcher();
        let event = dispatcher
            .dispatch(
                0,
                1,
                "PRESENCE_UPDATE",
                json!({"user": {"id": "42"}, "guild_id": "100", "status": "online"}),
            )
            .unwrap();
        assert!(matches!(event, Some(Event::PresenceUpdate(ref p)) if p.user.is_none()));
        assert!(dispatcher.cache().user(Snowflake::new(42)).is_none());
    }

    #[test]
    fn test_voice_join_and_leave() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(0, 1, "GUILD_CREATE", guild_create(100)).unwrap();
        let state = |channel: Option<&str>| {
            json!({"guild_id": "100", "channel_id": channel, "user_id": "1", "session_id": "s"})
        };

        dispatcher
            .dispatch(0, 1, "VOICE_STATE_UPDATE", state(Some("105")))
            .unwrap();
        assert!(dispatcher
            .cache()
            .voice_state(Snowflake::new(100), Snowflake::new(1))
            .is_some());

        let event = dispatcher.dispatch(0, 1, "VOICE_STATE_UPDATE", state(None)).unwrap();
        assert!(matches!(event, Some(Event::VoiceStateUpdate { old: Some(_), .. })));
        assert!(dispatcher
            .cache()
            .voice_state(Snowflake::new(100), Snowflake::new(1))
            .is_none());
    }

    #[test]
    fn test_user_update_replaces_current_user() {
        let dispatcher = dispatcher();
        dispatcher.cache().set_current_user(shardline_core::User::new(Snowflake::new(9), "bot"));

        let event = dispatcher
            .dispatch(0, 1, "USER_UPDATE", json!({"id": "9", "username": "renamed"}))
            .unwrap();
        assert!(matches!(event, Some(Event::UserUpdate { old: Some(ref old), .. }) if old.username == "bot"));
        assert_eq!(
            dispatcher.cache().current_user().map(|u| u.username),
            Some("renamed".to_string())
        );
    }

    #[test]
    fn test_typing_start_timestamp() {
        let dispatcher = dispatcher();
        let event = dispatcher
            .dispatch(
                0,
                1,
                "TYPING_START",
                json!({"channel_id": "101", "user_id": "2", "timestamp": 1_700_000_000}),
            )
            .unwrap();
        let Some(Event::TypingStart { timestamp, .. }) = event else {
            panic!("expected TypingStart, got {event:?}");
        };
        assert_eq!(timestamp.timestamp(), 1_700_000_000);
    }
}
