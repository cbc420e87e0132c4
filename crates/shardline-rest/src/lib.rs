//! # shardline-rest
//!
//! REST client with per-route buckets and a global limiter.
//!
//! ```text
//! caller -> RestClient::execute -> RateLimiter (bucket FIFO -> global) -> HttpTransport
//!                ^                                                            |
//!                +-------- reconcile headers / retry / surface error <--------+
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod ratelimit;
pub mod request;
pub mod route;
pub mod transport;

pub use client::{RestClient, RestClientConfig};
pub use endpoints::{
    CreateMessage, EditMessage, GatewayBotInfo, MessageReferenceBody, ModifyMember,
    SessionStartLimit,
};
pub use error::{ApiErrorBody, HttpTransportError, RestError, RestResult};
pub use ratelimit::{GlobalLimiter, RateLimitHeaders, RateLimiter, Ticket};
pub use request::Request;
pub use route::{Method, Route};
pub use transport::{FileAttachment, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport};
