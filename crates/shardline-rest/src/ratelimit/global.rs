//! Process-wide request ceiling

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Caps requests per second across every route, and holds all of them while
/// a global 429 is in effect
pub struct GlobalLimiter {
    per_second: u32,
    /// `None` when the ceiling is disabled
    ceiling: Option<DefaultDirectRateLimiter>,
    /// Admission checks run one at a time, in arrival order
    turn: tokio::sync::Mutex<()>,
    suspended_until: Mutex<Option<Instant>>,
}

impl GlobalLimiter {
    /// `per_second == 0` disables the ceiling
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second,
            ceiling: NonZeroU32::new(per_second).map(|n| RateLimiter::direct(Quota::per_second(n))),
            turn: tokio::sync::Mutex::new(()),
            suspended_until: Mutex::new(None),
        }
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Wait for global capacity and take one unit of it
    pub async fn acquire(&self) {
        let _turn = self.turn.lock().await;
        self.wait_out_suspension().await;

        let Some(ceiling) = &self.ceiling else {
            return;
        };
        if ceiling.check().is_err() {
            tracing::debug!(per_second = self.per_second, "Global request ceiling reached");
            ceiling.until_ready().await;
            // A global 429 may have arrived in the meantime
            self.wait_out_suspension().await;
        }
    }

    async fn wait_out_suspension(&self) {
        while let Some(until) = self.suspended_until() {
            sleep_until(until).await;
        }
    }

    /// Hold every route for `duration` from now
    pub fn suspend_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut suspended = self.suspended_until.lock();
        *suspended = Some(suspended.map_or(until, |current| current.max(until)));
    }

    /// End of the current global suspension, if one is active
    pub fn suspended_until(&self) -> Option<Instant> {
        let suspended = *self.suspended_until.lock();
        suspended.filter(|until| *until > Instant::now())
    }
}

impl fmt::Debug for GlobalLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalLimiter")
            .field("per_second", &self.per_second)
            .field("suspended_until", &self.suspended_until())
            .finish()
    }
}
