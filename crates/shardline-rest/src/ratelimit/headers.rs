//! Rate-limit feedback carried by responses

use serde::Deserialize;
use std::time::Duration;

use crate::transport::HttpResponse;

/// Parsed `X-RateLimit-*` and `Retry-After` headers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    /// Server-side bucket hash
    pub bucket: Option<String>,
    pub global: bool,
    /// `user`, `global`, or `shared`
    pub scope: Option<String>,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub fn from_response(response: &HttpResponse) -> Self {
        let number = |name: &str| response.header(name).and_then(|v| v.trim().parse::<u32>().ok());
        let seconds = |name: &str| {
            response
                .header(name)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        };

        Self {
            limit: number("x-ratelimit-limit"),
            remaining: number("x-ratelimit-remaining"),
            reset_after: seconds("x-ratelimit-reset-after"),
            bucket: response.header("x-ratelimit-bucket").map(str::to_string),
            global: response
                .header("x-ratelimit-global")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: response.header("x-ratelimit-scope").map(str::to_string),
            retry_after: seconds("retry-after"),
        }
    }

    /// Whether the response described its bucket
    pub fn has_bucket(&self) -> bool {
        self.limit.is_some() && self.remaining.is_some()
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitedBody {
    /// Seconds to wait
    #[serde(default)]
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub message: String,
}

/// How long a 429 asks the client to wait, and whether every route is affected
pub(crate) fn retry_after(response: &HttpResponse, headers: &RateLimitHeaders) -> (Duration, bool) {
    let body: RateLimitedBody = serde_json::from_slice(&response.body).unwrap_or_default();
    let from_body = Duration::try_from_secs_f64(body.retry_after)
        .ok()
        .filter(|d| !d.is_zero());
    let wait = from_body
        .or(headers.retry_after)
        .or(headers.reset_after)
        .unwrap_or(Duration::from_secs(1));
    (wait, headers.global || body.global)
}
