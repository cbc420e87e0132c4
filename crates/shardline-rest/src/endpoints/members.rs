//! Guild member endpoints

use serde::de::Error as _;
use serde::Serialize;
use shardline_core::{Member, MemberPayload, Snowflake, User};

use crate::client::RestClient;
use crate::error::{RestError, RestResult};
use crate::request::Request;
use crate::route::Route;

/// Body of a member modify; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModifyMember {
    /// `Some(None)` clears the nickname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaf: Option<bool>,
    /// `Some(None)` disconnects the member from voice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Option<Snowflake>>,
}

fn member_parts(
    route: &Route,
    guild_id: Snowflake,
    payload: MemberPayload,
) -> RestResult<(Member, User)> {
    payload
        .into_parts(guild_id)
        .ok_or_else(|| RestError::Decode {
            route: route.to_string(),
            source: serde_json::Error::missing_field("user"),
        })
}

impl RestClient {
    pub async fn get_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> RestResult<(Member, User)> {
        let route = Route::get(format!("/guilds/{guild_id}/members/{user_id}"));
        let payload = self.request(Request::new(route.clone())).await?;
        member_parts(&route, guild_id, payload)
    }

    pub async fn modify_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        changes: &ModifyMember,
    ) -> RestResult<(Member, User)> {
        let route = Route::patch(format!("/guilds/{guild_id}/members/{user_id}"));
        let payload = self
            .request(Request::new(route.clone()).json(changes)?)
            .await?;
        member_parts(&route, guild_id, payload)
    }

    pub async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> RestResult<()> {
        let route = Route::put(format!(
            "/guilds/{guild_id}/members/{user_id}/roles/{role_id}"
        ));
        self.request_empty(Request::new(route)).await
    }

    pub async fn remove_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> RestResult<()> {
        let route = Route::delete(format!(
            "/guilds/{guild_id}/members/{user_id}/roles/{role_id}"
        ));
        self.request_empty(Request::new(route)).await
    }
}
