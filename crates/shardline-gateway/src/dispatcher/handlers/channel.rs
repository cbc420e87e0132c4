//! Channel handlers

use serde_json::Value;
use shardline_core::{ChannelPayload, Event};

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::EventType;

/// Handles CHANNEL_CREATE, CHANNEL_UPDATE and CHANNEL_DELETE
pub struct ChannelHandler;

impl ChannelHandler {
    pub fn create(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: ChannelPayload = DispatchContext::decode(EventType::ChannelCreate, data)?;
        let channel = payload.to_channel(None);
        ctx.cache.upsert_channel(channel.clone(), payload.recipients);
        Ok(Some(Event::ChannelCreate(channel)))
    }

    /// Channel updates carry the full channel and replace the cached one
    pub fn update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: ChannelPayload = DispatchContext::decode(EventType::ChannelUpdate, data)?;
        let new = payload.to_channel(None);
        let old = ctx.cache.upsert_channel(new.clone(), payload.recipients);
        Ok(Some(Event::ChannelUpdate { old, new }))
    }

    /// Emits the cached channel when known, otherwise the payload's
    pub fn delete(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: ChannelPayload = DispatchContext::decode(EventType::ChannelDelete, data)?;
        let channel = payload.to_channel(None);
        let removed = ctx.cache.remove_channel(channel.guild_id, channel.id);
        Ok(Some(Event::ChannelDelete(removed.unwrap_or(channel))))
    }
}
