//! Per-bucket accounting

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::headers::RateLimitHeaders;

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Admitted; one unit of capacity was taken
    Go,
    /// Exhausted until the bucket resets
    Until(Instant),
    /// Exhausted by requests still in flight; wait for one to settle
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capacity {
    /// No response seen yet
    Unseen,
    /// The route answered without rate-limit headers
    Unlimited,
    Limited {
        limit: u32,
        remaining: u32,
        reset_at: Option<Instant>,
    },
}

#[derive(Debug)]
struct BucketState {
    capacity: Capacity,
    in_flight: u32,
}

impl BucketState {
    fn admit(&mut self, now: Instant) -> Admission {
        match &mut self.capacity {
            // One probe at a time until the server describes the bucket
            Capacity::Unseen if self.in_flight > 0 => return Admission::Feedback,
            Capacity::Unseen | Capacity::Unlimited => {}
            Capacity::Limited {
                limit,
                remaining,
                reset_at,
            } => {
                if reset_at.is_some_and(|reset| now >= reset) {
                    *remaining = *limit;
                    *reset_at = None;
                }
                if *remaining > 0 {
                    *remaining -= 1;
                } else if let Some(reset) = *reset_at {
                    return Admission::Until(reset);
                } else if self.in_flight > 0 {
                    return Admission::Feedback;
                }
                // Exhausted with no reset time and nothing in flight: nothing
                // would ever refill the bucket, so let the request probe it.
            }
        }
        self.in_flight += 1;
        Admission::Go
    }

    /// Give back an admission that never produced a response
    fn release(&mut self, sent: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if sent {
            // The server may have counted it; keep the decrement
            return;
        }
        if let Capacity::Limited {
            limit, remaining, ..
        } = &mut self.capacity
        {
            *remaining = (*remaining + 1).min(*limit);
        }
    }

    fn apply(&mut self, headers: &RateLimitHeaders, now: Instant) {
        match (headers.limit, headers.remaining) {
            (Some(limit), Some(reported)) => {
                // Responses overtaken by later admissions report stale counts;
                // within one window the lower count wins
                let remaining = match self.capacity {
                    Capacity::Limited {
                        remaining,
                        reset_at: Some(reset),
                        ..
                    } if now < reset => remaining.min(reported),
                    _ => reported,
                };
                self.capacity = Capacity::Limited {
                    limit,
                    remaining,
                    reset_at: headers.reset_after.map(|after| now + after),
                };
            }
            _ if self.capacity == Capacity::Unseen => self.capacity = Capacity::Unlimited,
            _ => {}
        }
    }

    fn exhaust_for(&mut self, wait: Duration, now: Instant) {
        let until = now + wait;
        match &mut self.capacity {
            Capacity::Limited {
                remaining,
                reset_at,
                ..
            } => {
                *remaining = 0;
                *reset_at = Some(reset_at.map_or(until, |reset| reset.max(until)));
            }
            other => {
                *other = Capacity::Limited {
                    limit: 1,
                    remaining: 0,
                    reset_at: Some(until),
                };
            }
        }
    }
}

/// One server-side bucket, shared by every route mapped to it
#[derive(Debug)]
pub(crate) struct Bucket {
    /// Holds waiters in arrival order
    pub(crate) queue: tokio::sync::Mutex<()>,
    state: Mutex<BucketState>,
    feedback: Notify,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            queue: tokio::sync::Mutex::new(()),
            state: Mutex::new(BucketState {
                capacity: Capacity::Unseen,
                in_flight: 0,
            }),
            feedback: Notify::new(),
        }
    }

    /// Try to take one unit of capacity
    pub(crate) fn admit(&self, now: Instant) -> Admission {
        self.state.lock().admit(now)
    }

    /// Resolves the next time a request on this bucket settles
    pub(crate) fn feedback(&self) -> tokio::sync::futures::Notified<'_> {
        self.feedback.notified()
    }

    /// Settle an admission with the response's headers
    pub(crate) fn settle(&self, headers: &RateLimitHeaders, now: Instant) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.apply(headers, now);
        }
        self.feedback.notify_waiters();
    }

    /// Adopt headers reported for a request admitted on another bucket
    pub(crate) fn observe(&self, headers: &RateLimitHeaders, now: Instant) {
        self.state.lock().apply(headers, now);
        self.feedback.notify_waiters();
    }

    /// Block the bucket for `wait` after a 429
    pub(crate) fn exhaust_for(&self, wait: Duration, now: Instant) {
        self.state.lock().exhaust_for(wait, now);
        self.feedback.notify_waiters();
    }

    /// Settle an admission that never produced a response
    pub(crate) fn release(&self, sent: bool) {
        self.state.lock().release(sent);
        self.feedback.notify_waiters();
    }

    /// Remaining capacity, when the bucket is limited
    pub(crate) fn remaining(&self) -> Option<u32> {
        match self.state.lock().capacity {
            Capacity::Limited { remaining, .. } => Some(remaining),
            Capacity::Unseen | Capacity::Unlimited => None,
        }
    }
}
