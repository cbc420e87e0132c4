//! Handshake admission
//!
//! Limits how many shards may be between connect and READY at once, and
//! spaces admissions by the identify interval. Waiters are served in
//! arrival order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};

/// The gate was closed for shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Handshake gate closed")]
pub struct GateClosed;

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Admission control for shard handshakes
#[derive(Debug)]
pub struct HandshakeGate {
    slots: Arc<Semaphore>,
    /// Time of the last admission; the lock doubles as the FIFO queue
    last_admission: Mutex<Option<Instant>>,
    interval: Duration,
    counters: Arc<Counters>,
}

/// Held by a shard from admission until READY/RESUMED or failure
#[derive(Debug)]
pub struct HandshakePermit {
    _slot: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for HandshakePermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HandshakeGate {
    pub fn new(concurrency: u32, interval: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(concurrency.max(1) as usize)),
            last_admission: Mutex::new(None),
            interval,
            counters: Arc::default(),
        }
    }

    /// Wait for a handshake slot.
    ///
    /// Returns once fewer than `concurrency` handshakes are in flight and
    /// `interval` has passed since the previous admission.
    pub async fn acquire(&self) -> Result<HandshakePermit, GateClosed> {
        let mut last = self.last_admission.lock().await;
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;

        if let Some(previous) = *last {
            sleep_until(previous + self.interval).await;
        }
        if self.slots.is_closed() {
            return Err(GateClosed);
        }
        *last = Some(Instant::now());

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        Ok(HandshakePermit {
            _slot: slot,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Stop admitting. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Handshakes currently admitted
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous handshakes seen so far
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}
