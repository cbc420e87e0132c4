//! Rate limiting
//!
//! Every request is admitted by its route's bucket and then by the global
//! limiter. Admission takes capacity up front; the response's headers then
//! replace the local estimate.

mod bucket;
mod global;
mod headers;
mod limiter;

pub use global::GlobalLimiter;
pub use headers::{RateLimitHeaders, RateLimitedBody};
pub use limiter::{RateLimiter, Ticket};

pub(crate) use headers::retry_after;
