//! Heartbeat schedule and zombie detection

use std::time::Duration;
use tokio::time::Instant;

/// Heartbeat bookkeeping for one connection
#[derive(Debug, Clone, Copy)]
pub(crate) struct Heartbeater {
    interval: Duration,
    next_beat: Instant,
    awaiting_ack: bool,
}

/// The previous heartbeat was never acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Zombie;

impl Heartbeater {
    /// Start the schedule. The first beat fires after `jitter * interval` so
    /// shards that connect together do not heartbeat together.
    pub(crate) fn start(interval: Duration, now: Instant, jitter: f64) -> Self {
        Self {
            interval,
            next_beat: now + interval.mul_f64(jitter.clamp(0.0, 1.0)),
            awaiting_ack: false,
        }
    }

    pub(crate) fn next_beat(&self) -> Instant {
        self.next_beat
    }

    /// Called when a beat is due. Fails if the last beat is still unacknowledged.
    pub(crate) fn beat(&mut self, now: Instant) -> Result<(), Zombie> {
        if self.awaiting_ack {
            return Err(Zombie);
        }
        self.awaiting_ack = true;
        self.next_beat = now + self.interval;
        Ok(())
    }

    /// Beat while inbound frames are not being read. The ack cannot be seen
    /// until reading resumes, so this beat is not held against the connection.
    pub(crate) fn beat_unchecked(&mut self, now: Instant) {
        self.awaiting_ack = false;
        self.next_beat = now + self.interval;
    }

    pub(crate) fn ack(&mut self) {
        self.awaiting_ack = false;
    }
}
