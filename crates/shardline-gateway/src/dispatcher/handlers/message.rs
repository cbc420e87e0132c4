//! Message handlers

use serde_json::Value;
use shardline_core::{Event, MessagePatch, MessagePayload};

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::{EventType, MessageDeleteBulkPayload, MessageDeletePayload};

/// Handles the MESSAGE_* dispatches
pub struct MessageHandler;

impl MessageHandler {
    /// Caches the author and mentioned members, then the message itself
    pub fn create(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MessagePayload = DispatchContext::decode(EventType::MessageCreate, data)?;

        match (payload.guild_id, &payload.member) {
            (Some(guild_id), Some(member)) => {
                let member = member.to_member(guild_id, payload.author.id);
                ctx.cache.insert_member_if_absent(member, payload.author.clone());
            }
            _ => {
                ctx.cache.replace_user(payload.author.clone());
            }
        }

        for mention in &payload.mentions {
            match (payload.guild_id, &mention.member) {
                (Some(guild_id), Some(member)) => {
                    let member = member.to_member(guild_id, mention.user.id);
                    ctx.cache.insert_member_if_absent(member, mention.user.clone());
                }
                _ => {
                    ctx.cache.replace_user(mention.user.clone());
                }
            }
        }

        let message = payload.to_message();
        ctx.cache.push_message(message.clone());
        Ok(Some(Event::MessageCreate(message)))
    }

    /// Edits carry only the changed fields
    pub fn update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let patch: MessagePatch = DispatchContext::decode(EventType::MessageUpdate, data)?;
        let (old, new) = ctx.cache.update_message(&patch).unzip();
        Ok(Some(Event::MessageUpdate {
            channel_id: patch.channel_id,
            message_id: patch.id,
            guild_id: patch.guild_id,
            old,
            new,
        }))
    }

    pub fn delete(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MessageDeletePayload = DispatchContext::decode(EventType::MessageDelete, data)?;
        let old = ctx
            .cache
            .remove_message(payload.guild_id, payload.channel_id, payload.id);
        Ok(Some(Event::MessageDelete {
            channel_id: payload.channel_id,
            message_id: payload.id,
            guild_id: payload.guild_id,
            old,
        }))
    }

    pub fn delete_bulk(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MessageDeleteBulkPayload =
            DispatchContext::decode(EventType::MessageDeleteBulk, data)?;
        let old = ctx
            .cache
            .remove_messages(payload.guild_id, payload.channel_id, &payload.ids);
        Ok(Some(Event::MessageDeleteBulk {
            channel_id: payload.channel_id,
            guild_id: payload.guild_id,
            message_ids: payload.ids,
            old,
        }))
    }
}
