//! Guild lifecycle handlers

use serde_json::Value;
use shardline_cache::GuildSnapshot;
use shardline_core::{Event, GuildPatch};

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::{EventType, GuildCreatePayload, UnavailableGuild};

/// Handles GUILD_CREATE, GUILD_UPDATE and GUILD_DELETE
pub struct GuildHandler;

impl GuildHandler {
    /// Full guild sync. Replaces everything cached for the guild.
    pub fn create(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        // An outage stub, not a full guild
        if data.get("unavailable").and_then(Value::as_bool) == Some(true) {
            let stub: UnavailableGuild = DispatchContext::decode(EventType::GuildCreate, data)?;
            ctx.cache.mark_unavailable([stub.id]);
            tracing::debug!(shard_id = ctx.shard_id, guild_id = %stub.id, "Guild still unavailable");
            return Ok(None);
        }

        let payload: GuildCreatePayload = DispatchContext::decode(EventType::GuildCreate, data)?;
        let guild_id = payload.guild.id;

        let mut snapshot = GuildSnapshot::new(payload.guild.clone());
        snapshot.channels = payload
            .channels
            .iter()
            .map(|channel| channel.to_channel(Some(guild_id)))
            .collect();
        snapshot.roles = payload.roles;
        snapshot.members = payload
            .members
            .into_iter()
            .filter_map(|member| member.into_parts(guild_id))
            .collect();
        snapshot.voice_states = payload.voice_states;

        let was_pending = ctx.cache.insert_guild(snapshot);
        if was_pending {
            tracing::debug!(shard_id = ctx.shard_id, guild_id = %guild_id, "Guild available");
            Ok(Some(Event::GuildAvailable(payload.guild)))
        } else {
            tracing::info!(shard_id = ctx.shard_id, guild_id = %guild_id, "Joined guild");
            Ok(Some(Event::GuildJoined(payload.guild)))
        }
    }

    /// Guild metadata changed; merged onto the cached guild
    pub fn update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let patch: GuildPatch = DispatchContext::decode(EventType::GuildUpdate, data)?;

        if let Some((old, new)) = ctx.cache.update_guild(&patch) {
            return Ok(Some(Event::GuildUpdate { old: Some(old), new }));
        }

        tracing::debug!(guild_id = %patch.id, "Update for uncached guild");
        Ok(patch
            .to_guild()
            .map(|new| Event::GuildUpdate { old: None, new }))
    }

    /// Guild outage or removal. Either way the guild is evicted.
    pub fn delete(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let stub: UnavailableGuild = DispatchContext::decode(EventType::GuildDelete, data)?;
        let unavailable = stub.unavailable.unwrap_or(false);
        let old = ctx.cache.remove_guild(stub.id, unavailable);

        if unavailable {
            tracing::warn!(shard_id = ctx.shard_id, guild_id = %stub.id, "Guild became unavailable");
            Ok(Some(Event::GuildUnavailable {
                guild_id: stub.id,
                old,
            }))
        } else {
            tracing::info!(shard_id = ctx.shard_id, guild_id = %stub.id, "Left guild");
            Ok(Some(Event::GuildLeft {
                guild_id: stub.id,
                old,
            }))
        }
    }
}
