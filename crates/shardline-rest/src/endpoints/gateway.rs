//! Gateway capability query

use serde::Deserialize;

use crate::client::RestClient;
use crate::error::RestResult;
use crate::request::Request;
use crate::route::Route;

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayBotInfo {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

/// Identify budget for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until the budget resets
    pub reset_after: u64,
    /// Shards allowed to identify at once
    pub max_concurrency: u32,
}

impl RestClient {
    /// Recommended shard count, identify budget, and gateway URL
    pub async fn gateway_bot(&self) -> RestResult<GatewayBotInfo> {
        self.request(Request::new(Route::get("/gateway/bot"))).await
    }
}
