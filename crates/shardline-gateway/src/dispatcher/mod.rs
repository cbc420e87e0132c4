//! Dispatcher
//!
//! Turns dispatch frames into cache mutations and typed [`Event`]s. Each
//! event type has one handler; tags this client does not know are ignored.

mod handlers;

use serde::de::DeserializeOwned;
use serde_json::Value;
use shardline_cache::EntityCache;
use shardline_core::Event;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::events::EventType;
use handlers::{
    ChannelHandler, GuildHandler, MemberHandler, MessageHandler, ReadyHandler, RoleHandler,
    UserHandler,
};

/// Result of handling one dispatch: the event to emit, if any
pub type DispatchResult = Result<Option<Event>, DispatchError>;

/// What a handler sees while processing one frame
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub shard_id: u32,
    pub shard_count: u32,
    pub cache: &'a EntityCache,
}

impl DispatchContext<'_> {
    /// Decode the frame payload for `event_type`
    pub(crate) fn decode<T: DeserializeOwned>(
        event_type: EventType,
        data: Value,
    ) -> Result<T, DispatchError> {
        serde_json::from_value(data).map_err(|source| DispatchError {
            event_type: event_type.as_str(),
            source,
        })
    }
}

/// Routes dispatch frames to their handlers
///
/// Shared by every shard. Frames of one shard are handled sequentially by
/// that shard's task, so per-guild ordering holds without a global lock.
#[derive(Debug)]
pub struct Dispatcher {
    cache: Arc<EntityCache>,
}

impl Dispatcher {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Handle one dispatch frame.
    ///
    /// Unknown event types yield `Ok(None)`. A payload that fails to decode
    /// is an error; the cache is left untouched in that case.
    pub fn dispatch(
        &self,
        shard_id: u32,
        shard_count: u32,
        event_name: &str,
        data: Value,
    ) -> DispatchResult {
        let Some(event_type) = EventType::from_name(event_name) else {
            tracing::trace!(shard_id, event = %event_name, "Ignoring unknown dispatch");
            return Ok(None);
        };

        let ctx = DispatchContext {
            shard_id,
            shard_count,
            cache: &self.cache,
        };

        tracing::trace!(shard_id, event = %event_type, "Dispatching");

        match event_type {
            EventType::Ready => ReadyHandler::ready(&ctx, data),
            EventType::Resumed => Ok(Some(Event::Resumed)),

            EventType::GuildCreate => GuildHandler::create(&ctx, data),
            EventType::GuildUpdate => GuildHandler::update(&ctx, data),
            EventType::GuildDelete => GuildHandler::delete(&ctx, data),

            EventType::ChannelCreate => ChannelHandler::create(&ctx, data),
            EventType::ChannelUpdate => ChannelHandler::update(&ctx, data),
            EventType::ChannelDelete => ChannelHandler::delete(&ctx, data),

            EventType::GuildRoleCreate => RoleHandler::create(&ctx, data),
            EventType::GuildRoleUpdate => RoleHandler::update(&ctx, data),
            EventType::GuildRoleDelete => RoleHandler::delete(&ctx, data),

            EventType::GuildMemberAdd => MemberHandler::add(&ctx, data),
            EventType::GuildMemberUpdate => MemberHandler::update(&ctx, data),
            EventType::GuildMemberRemove => MemberHandler::remove(&ctx, data),
            EventType::GuildMembersChunk => MemberHandler::chunk(&ctx, data),

            EventType::MessageCreate => MessageHandler::create(&ctx, data),
            EventType::MessageUpdate => MessageHandler::update(&ctx, data),
            EventType::MessageDelete => MessageHandler::delete(&ctx, data),
            EventType::MessageDeleteBulk => MessageHandler::delete_bulk(&ctx, data),

            EventType::UserUpdate => UserHandler::user_update(&ctx, data),
            EventType::PresenceUpdate => UserHandler::presence_update(&ctx, data),
            EventType::VoiceStateUpdate => UserHandler::voice_state_update(&ctx, data),
            EventType::TypingStart => UserHandler::typing_start(&ctx, data),
        }
    }
}
