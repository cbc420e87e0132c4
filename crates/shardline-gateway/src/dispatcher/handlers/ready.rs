//! READY handler

use serde_json::Value;
use shardline_core::{Event, ReadyEvent, Snowflake};
use std::collections::HashSet;

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::{EventType, ReadyPayload};

/// Handles READY
pub struct ReadyHandler;

impl ReadyHandler {
    /// A fresh session: record the current user and the guilds still to
    /// stream in, and forget guilds of this shard the session no longer lists.
    pub fn ready(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: ReadyPayload = DispatchContext::decode(EventType::Ready, data)?;

        let guild_ids: Vec<Snowflake> = payload.guilds.iter().map(|guild| guild.id).collect();
        let keep: HashSet<Snowflake> = guild_ids.iter().copied().collect();

        ctx.cache.set_current_user(payload.user.clone());
        ctx.cache.prune_shard_guilds(ctx.shard_id, ctx.shard_count, &keep);
        ctx.cache.mark_unavailable(guild_ids.iter().copied());

        tracing::info!(
            shard_id = ctx.shard_id,
            user_id = %payload.user.id,
            guilds = guild_ids.len(),
            "Session ready"
        );

        Ok(Some(Event::Ready(ReadyEvent {
            user: payload.user,
            session_id: payload.session_id,
            guild_ids,
        })))
    }
}
