//! Role handlers

use serde_json::Value;
use shardline_core::Event;

use crate::dispatcher::{DispatchContext, DispatchResult};
use crate::events::{EventType, GuildRoleDeletePayload, GuildRolePayload};

/// Handles GUILD_ROLE_CREATE, GUILD_ROLE_UPDATE and GUILD_ROLE_DELETE
pub struct RoleHandler;

impl RoleHandler {
    pub fn create(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: GuildRolePayload = DispatchContext::decode(EventType::GuildRoleCreate, data)?;
        ctx.cache.upsert_role(payload.guild_id, payload.role.clone());
        Ok(Some(Event::RoleCreate {
            guild_id: payload.guild_id,
            role: payload.role,
        }))
    }

    pub fn update(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: GuildRolePayload = DispatchContext::decode(EventType::GuildRoleUpdate, data)?;
        let old = ctx.cache.upsert_role(payload.guild_id, payload.role.clone());
        Ok(Some(Event::RoleUpdate {
            guild_id: payload.guild_id,
            old,
            new: payload.role,
        }))
    }

    /// Also strips the role from every cached member
    pub fn delete(ctx: &DispatchContext<'_>, data: Value) -> DispatchResult {
        let payload: GuildRoleDeletePayload =
            DispatchContext::decode(EventType::GuildRoleDelete, data)?;
        let old = ctx.cache.remove_role(payload.guild_id, payload.role_id);
        Ok(Some(Event::RoleDelete {
            guild_id: payload.guild_id,
            role_id: payload.role_id,
            old,
        }))
    }
}
