//! Request pipeline
//!
//! ```text
//! acquire ticket -> send -> 2xx      -> reconcile bucket, return
//!                        -> 429      -> reconcile, hold bucket or all routes, requeue
//!                        -> 5xx/err  -> backoff (or Retry-After), requeue (bounded)
//!                        -> 4xx      -> reconcile, surface ApiError
//! ```

use serde::de::DeserializeOwned;
use shardline_common::{BackoffConfig, ClientConfig, Token};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{ApiErrorBody, RestError, RestResult};
use crate::ratelimit::{retry_after, RateLimitHeaders, RateLimiter};
use crate::request::Request;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// REST client settings
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub token: Token,
    /// Versioned API root, e.g. `https://discord.com/api/v10`
    pub base_url: String,
    /// Attempts after the first for 5xx and transport failures
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub global_limit_per_second: u32,
    /// 429s one request may absorb before failing with
    /// [`RestError::RateLimited`]; `None` waits them out indefinitely
    pub max_rate_limit_retries: Option<u32>,
    pub backoff: BackoffConfig,
}

impl RestClientConfig {
    pub fn from_client(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            base_url: format!(
                "{}/v{}",
                config.rest.api_base_url.trim_end_matches('/'),
                config.api_version
            ),
            max_retries: config.rest.max_retries,
            request_timeout: config.rest.request_timeout,
            global_limit_per_second: config.rest.global_limit_per_second,
            max_rate_limit_retries: config.rest.max_rate_limit_retries,
            backoff: config.backoff,
        }
    }
}

/// Rate-limited REST client
///
/// Cheap to clone; clones share the transport and the limiter.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    config: Arc<RestClientConfig>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Client over reqwest
    pub fn new(config: RestClientConfig) -> RestResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)
            .map_err(|source| RestError::Transport {
                attempts: 0,
                source,
            })?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client over any transport
    pub fn with_transport(config: RestClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            limiter: Arc::new(RateLimiter::new(config.global_limit_per_second)),
            config: Arc::new(config),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Fail queued and future requests
    pub fn close(&self) {
        tracing::info!("REST client closing");
        self.limiter.close();
    }

    /// Run a request through admission, retries, and error decoding
    pub async fn execute(&self, request: &Request) -> RestResult<HttpResponse> {
        let route = request.route();
        let mut failures = 0u32;
        let mut rate_limited = 0u32;

        loop {
            let mut ticket = self.limiter.acquire(route).await?;
            let http = self.build(request);
            ticket.mark_sent();
            tracing::trace!(route = %route, "Sending request");

            let response = match self.transport.send(http).await {
                Ok(response) => response,
                Err(source) => {
                    drop(ticket);
                    if failures >= self.config.max_retries {
                        tracing::error!(route = %route, error = %source, "Request failed, retries exhausted");
                        return Err(RestError::Transport {
                            attempts: failures + 1,
                            source,
                        });
                    }
                    let delay = self.config.backoff.delay_for_attempt(failures);
                    failures += 1;
                    tracing::warn!(
                        route = %route,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "Request failed, retrying"
                    );
                    self.pause(delay).await?;
                    continue;
                }
            };

            let headers = RateLimitHeaders::from_response(&response);

            if response.status == 429 {
                let (wait, global) = retry_after(&response, &headers);
                if global {
                    self.limiter.global().suspend_for(wait);
                    self.limiter.complete(ticket, &headers);
                } else {
                    self.limiter.complete_rate_limited(ticket, &headers, wait);
                }
                rate_limited += 1;
                tracing::warn!(
                    route = %route,
                    retry_after_ms = wait.as_millis() as u64,
                    global,
                    scope = headers.scope.as_deref().unwrap_or("user"),
                    "Rate limited"
                );
                if self
                    .config
                    .max_rate_limit_retries
                    .is_some_and(|max| rate_limited > max)
                {
                    return Err(RestError::RateLimited {
                        route: route.to_string(),
                        attempts: rate_limited,
                    });
                }
                continue;
            }

            self.limiter.complete(ticket, &headers);

            match response.status {
                200..=299 => return Ok(response),
                status if status >= 500 => {
                    if failures >= self.config.max_retries {
                        tracing::error!(route = %route, status, "Server error, retries exhausted");
                        return Err(RestError::Server {
                            status,
                            attempts: failures + 1,
                        });
                    }
                    let delay = self.config.backoff.delay_with_hint(failures, headers.retry_after);
                    failures += 1;
                    tracing::warn!(
                        route = %route,
                        status,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Server error, retrying"
                    );
                    self.pause(delay).await?;
                }
                status => {
                    let body = ApiErrorBody::from_bytes(&response.body);
                    tracing::debug!(route = %route, status, code = body.code, "Request rejected");
                    return Err(RestError::Api { status, body });
                }
            }
        }
    }

    /// Execute and decode a JSON response
    pub async fn request<T: DeserializeOwned>(&self, request: Request) -> RestResult<T> {
        let response = self.execute(&request).await?;
        serde_json::from_slice(&response.body).map_err(|source| RestError::Decode {
            route: request.route().to_string(),
            source,
        })
    }

    /// Execute a request whose response body is ignored
    pub async fn request_empty(&self, request: Request) -> RestResult<()> {
        self.execute(&request).await.map(|_| ())
    }

    fn build(&self, request: &Request) -> HttpRequest {
        let route = request.route();
        HttpRequest {
            method: route.method(),
            url: format!("{}{}", self.config.base_url, route.path()),
            headers: vec![(
                "Authorization".to_string(),
                self.config.token.authorization_header(),
            )],
            body: request.body().clone(),
        }
    }

    /// Sleep between retries, cut short by [`Self::close`]
    async fn pause(&self, delay: Duration) -> RestResult<()> {
        let mut shutdown: watch::Receiver<bool> = self.limiter.subscribe_shutdown();
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => Err(RestError::Shutdown),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::HttpTransportError;
    use crate::route::Route;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    type Reply = Result<HttpResponse, HttpTransportError>;

    /// Answers requests from a queue and records what was sent
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        pub(crate) sent: Mutex<Vec<(HttpRequest, Instant)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Reply {
            self.sent.lock().push((request, Instant::now()));
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(204)))
        }
    }

    pub(crate) fn config() -> RestClientConfig {
        RestClientConfig {
            token: Token::new("test-token"),
            base_url: "https://api.test/v10".to_string(),
            max_retries: 2,
            request_timeout: Duration::from_secs(5),
            global_limit_per_second: 0,
            max_rate_limit_retries: None,
            backoff: BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(8))
                .without_jitter(),
        }
    }

    pub(crate) fn client(transport: &Arc<ScriptedTransport>) -> RestClient {
        RestClient::with_transport(config(), Arc::clone(transport) as Arc<dyn HttpTransport>)
    }

    pub(crate) fn json(status: u16, body: &serde_json::Value) -> Reply {
        Ok(HttpResponse::new(status).with_body(body.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_sends_authorization() {
        let transport = ScriptedTransport::new(vec![json(200, &serde_json::json!({"ok": true}))]);
        let client = client(&transport);

        let value: serde_json::Value = client
            .request(Request::new(Route::get("/users/@me")))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);

        let sent = transport.sent.lock();
        assert_eq!(sent[0].0.url, "https://api.test/v10/users/@me");
        assert!(sent[0]
            .0
            .headers
            .contains(&("Authorization".to_string(), "Bot test-token".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![json(
            404,
            &serde_json::json!({"code": 10003, "message": "Unknown Channel"}),
        )]);
        let client = client(&transport);

        let err = client
            .request_empty(Request::new(Route::get("/channels/5")))
            .await
            .unwrap_err();
        match err {
            RestError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body.code, 10003);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retry_with_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(502)),
            Err(HttpTransportError::Timeout),
            Ok(HttpResponse::new(204)),
        ]);
        let client = client(&transport);

        client
            .request_empty(Request::new(Route::delete("/channels/1/messages/2")))
            .await
            .unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 3);
        assert!(sent[1].1 - sent[0].1 >= Duration::from_secs(1));
        assert!(sent[2].1 - sent[1].1 >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(500)),
            Ok(HttpResponse::new(500)),
            Ok(HttpResponse::new(503)),
        ]);
        let client = client(&transport);

        let err = client
            .request_empty(Request::new(Route::get("/gateway/bot")))
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Server { status: 503, attempts: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_honours_retry_after() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503).with_header("Retry-After", "5")),
            Ok(HttpResponse::new(204)),
        ]);
        let client = client(&transport);

        client
            .request_empty(Request::new(Route::get("/gateway/bot")))
            .await
            .unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        // The hint outweighs the 1s backoff step
        assert!(sent[1].1 - sent[0].1 >= Duration::from_secs(5));
    }

    fn route_429() -> Reply {
        Ok(HttpResponse::new(429)
            .with_header("Retry-After", "1")
            .with_body(r#"{"retry_after": 1.0, "global": false}"#))
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_429s_are_waited_out() {
        let mut replies: Vec<Reply> = (0..40).map(|_| route_429()).collect();
        replies.push(Ok(HttpResponse::new(204)));
        let transport = ScriptedTransport::new(replies);
        let client = client(&transport);

        client
            .request_empty(Request::new(Route::post("/channels/1/typing")))
            .await
            .unwrap();
        assert_eq!(transport.sent.lock().len(), 41);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cap_is_opt_in() {
        let transport = ScriptedTransport::new((0..10).map(|_| route_429()).collect());
        let client = RestClient::with_transport(
            RestClientConfig {
                max_rate_limit_retries: Some(3),
                ..config()
            },
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        );

        let err = client
            .request_empty(Request::new(Route::post("/channels/1/typing")))
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::RateLimited { attempts: 4, .. }));
        assert_eq!(transport.sent.lock().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_429_is_retried_after_delay() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(429)
                .with_header("Retry-After", "2")
                .with_body(r#"{"message": "slow down", "retry_after": 2.0, "global": false}"#)),
            Ok(HttpResponse::new(204)),
        ]);
        let client = client(&transport);

        client
            .request_empty(Request::new(Route::post("/channels/1/typing")))
            .await
            .unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1 - sent[0].1 >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_429_holds_other_routes() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(429)
                .with_header("X-RateLimit-Global", "true")
                .with_body(r#"{"retry_after": 1.0, "global": true}"#)),
            Ok(HttpResponse::new(204)),
            Ok(HttpResponse::new(204)),
        ]);
        let client = client(&transport);

        let start = Instant::now();
        let (first, second) = tokio::join!(
            client.request_empty(Request::new(Route::get("/channels/1"))),
            client.request_empty(Request::new(Route::get("/guilds/2"))),
        );
        first.unwrap();
        second.unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 3);
        assert!(sent[1].1 - start >= Duration::from_secs(1));
        assert!(sent[2].1 - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_interrupts_backoff() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(500))]);
        let client = client(&transport);

        let pending = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request_empty(Request::new(Route::get("/users/@me")))
                    .await
            })
        };
        tokio::task::yield_now().await;
        client.close();

        assert!(matches!(pending.await.unwrap(), Err(RestError::Shutdown)));
    }
}
