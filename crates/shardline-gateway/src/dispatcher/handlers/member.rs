//! Member handlers

use serde::de::Error as _;
use serde_json::Value;
use shardline_core::{Event, Member};

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::error::DispatchError;
use crate::events::{
    EventType, MemberAddPayload, MemberRemovePayload, MemberUpdatePayload, MembersChunkPayload,
};

/// Handles the GUILD_MEMBER_* dispatches
pub struct MemberHandler;

impl MemberHandler {
    pub fn add(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MemberAddPayload = DispatchContext::decode(EventType::GuildMemberAdd, data)?;
        let (member, user) =
            payload
                .member
                .into_parts(payload.guild_id)
                .ok_or_else(|| DispatchError {
                    event_type: EventType::GuildMemberAdd.as_str(),
                    source: serde_json::Error::missing_field("user"),
                })?;

        ctx.cache.upsert_member(member.clone(), user.clone());
        Ok(Some(Event::MemberAdd { member, user }))
    }

    /// Partial update merged onto the cached member
    pub fn update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MemberUpdatePayload =
            DispatchContext::decode(EventType::GuildMemberUpdate, data)?;
        let guild_id = payload.guild_id;
        let user_id = payload.user.id;

        if let Some((old, new)) = ctx.cache.merge_member(guild_id, payload.user, &payload.patch) {
            return Ok(Some(Event::MemberUpdate { old, new }));
        }

        // Not cached: the event carries what the patch alone says
        let mut new = Member::new(guild_id, user_id);
        new.apply_patch(&payload.patch);
        Ok(Some(Event::MemberUpdate { old: None, new }))
    }

    pub fn remove(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MemberRemovePayload =
            DispatchContext::decode(EventType::GuildMemberRemove, data)?;
        let old = ctx.cache.remove_member(payload.guild_id, payload.user.id);
        Ok(Some(Event::MemberRemove {
            guild_id: payload.guild_id,
            user: payload.user,
            old,
        }))
    }

    /// Bulk member sync answering a Request Guild Members
    pub fn chunk(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: MembersChunkPayload =
            DispatchContext::decode(EventType::GuildMembersChunk, data)?;
        let guild_id = payload.guild_id;

        let mut member_ids = Vec::with_capacity(payload.members.len());
        for (member, user) in payload
            .members
            .into_iter()
            .filter_map(|member| member.into_parts(guild_id))
        {
            member_ids.push(member.user_id);
            ctx.cache.upsert_member(member, user);
        }

        tracing::debug!(
            shard_id = ctx.shard_id,
            guild_id = %guild_id,
            chunk = payload.chunk_index + 1,
            of = payload.chunk_count,
            members = member_ids.len(),
            "Member chunk"
        );

        Ok(Some(Event::MembersChunk {
            guild_id,
            chunk_index: payload.chunk_index,
            chunk_count: payload.chunk_count,
            member_ids,
            not_found: payload.not_found,
            nonce: payload.nonce,
        }))
    }
}
