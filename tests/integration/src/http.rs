//! In-memory HTTP API
//!
//! A [`MockHttp`] answers every request through a handler closure and keeps
//! a log of what was sent and when, in (paused) Tokio time.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shardline_rest::{HttpRequest, HttpResponse, HttpTransport, HttpTransportError, Method};
use std::sync::Arc;
use tokio::time::Instant;

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// A request the client sent
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub at: Instant,
}

impl RecordedRequest {
    /// URL path after the API base and version, e.g. `/channels/1/messages`
    pub fn path(&self) -> &str {
        let Some(rest) = self.url.strip_prefix(crate::fixtures::API_BASE_URL) else {
            return &self.url;
        };
        let rest = rest.trim_start_matches('/');
        rest.find('/').map_or(rest, |slash| &rest[slash..])
    }
}

pub struct MockHttp {
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttp {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for MockHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpTransportError> {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            at: Instant::now(),
        });
        Ok((self.handler)(&request))
    }
}

// =============================================================================
// Responses
// =============================================================================

pub fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

/// A success carrying bucket headers
pub fn limited_response(body: &Value, bucket: &str, limit: u32, remaining: u32, reset_after: f64) -> HttpResponse {
    json_response(200, body)
        .with_header("x-ratelimit-bucket", bucket)
        .with_header("x-ratelimit-limit", limit.to_string())
        .with_header("x-ratelimit-remaining", remaining.to_string())
        .with_header("x-ratelimit-reset-after", reset_after.to_string())
}

/// A 429 for the whole application
pub fn global_rate_limit(retry_after: f64) -> HttpResponse {
    json_response(
        429,
        &serde_json::json!({
            "message": "You are being rate limited.",
            "retry_after": retry_after,
            "global": true
        }),
    )
    .with_header("x-ratelimit-global", "true")
    .with_header("x-ratelimit-scope", "global")
    .with_header("retry-after", retry_after.ceil().to_string())
}
