//! Route-to-bucket table and admission

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use super::bucket::{Admission, Bucket};
use super::global::GlobalLimiter;
use super::headers::RateLimitHeaders;
use crate::error::RestError;
use crate::route::Route;

/// Shared rate-limit state for every caller of the pipeline
#[derive(Debug)]
pub struct RateLimiter {
    /// Route key -> bucket id, once the server has named the bucket
    routes: DashMap<String, String>,
    buckets: DashMap<String, Arc<Bucket>>,
    global: GlobalLimiter,
    shutdown: watch::Sender<bool>,
}

impl RateLimiter {
    pub fn new(global_per_second: u32) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            routes: DashMap::new(),
            buckets: DashMap::new(),
            global: GlobalLimiter::new(global_per_second),
            shutdown,
        }
    }

    pub fn global(&self) -> &GlobalLimiter {
        &self.global
    }

    /// Bucket id currently used for a route
    pub fn bucket_id(&self, route: &Route) -> String {
        self.routes
            .get(route.key())
            .map_or_else(|| route.key().to_string(), |id| id.value().clone())
    }

    /// Known remaining capacity for a route's bucket
    pub fn remaining(&self, route: &Route) -> Option<u32> {
        self.buckets
            .get(&self.bucket_id(route))
            .and_then(|bucket| bucket.remaining())
    }

    fn bucket_for(&self, route: &Route) -> Arc<Bucket> {
        let id = self.bucket_id(route);
        Arc::clone(
            self.buckets
                .entry(id)
                .or_insert_with(|| Arc::new(Bucket::new()))
                .value(),
        )
    }

    /// Wait until `route` may send, then hand out a ticket for it
    ///
    /// Waiters on one bucket are admitted in arrival order. Fails with
    /// [`RestError::Shutdown`] once [`Self::close`] is called.
    pub async fn acquire(&self, route: &Route) -> Result<Ticket, RestError> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(RestError::Shutdown);
        }

        tokio::select! {
            biased;

            _ = shutdown.wait_for(|stop| *stop) => Err(RestError::Shutdown),

            ticket = self.admit(route) => Ok(ticket),
        }
    }

    async fn admit(&self, route: &Route) -> Ticket {
        let mut bucket = self.bucket_for(route);
        loop {
            let turn = bucket.queue.lock().await;
            if let Some(ticket) = self.admit_on(route, &bucket).await {
                // Still holding the turn, so the bucket stays FIFO across the global wait
                self.global.acquire().await;
                drop(turn);
                return ticket;
            }
            drop(turn);
            bucket = self.bucket_for(route);
            tracing::trace!(route = %route, "Route re-keyed while waiting, moving to its bucket");
        }
    }

    /// Admit on `bucket`, or `None` once the route has moved to another one
    async fn admit_on(&self, route: &Route, bucket: &Arc<Bucket>) -> Option<Ticket> {
        loop {
            if !Arc::ptr_eq(&self.bucket_for(route), bucket) {
                return None;
            }

            let feedback = bucket.feedback();
            tokio::pin!(feedback);
            feedback.as_mut().enable();

            match bucket.admit(Instant::now()) {
                Admission::Go => return Some(Ticket::new(route.clone(), Arc::clone(bucket))),
                Admission::Until(reset) => {
                    tracing::debug!(
                        route = %route,
                        wait_ms = reset.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Bucket exhausted, waiting for reset"
                    );
                    tokio::select! {
                        () = sleep_until(reset) => {}
                        () = &mut feedback => {}
                    }
                }
                Admission::Feedback => {
                    tracing::trace!(route = %route, "Waiting for in-flight requests");
                    feedback.await;
                }
            }
        }
    }

    /// Settle a ticket with the headers of its response
    pub fn complete(&self, mut ticket: Ticket, headers: &RateLimitHeaders) {
        ticket.settled = true;
        let now = Instant::now();
        ticket.bucket.settle(headers, now);

        if let Some(target) = self.rekey(&ticket.route, headers, &ticket.bucket) {
            target.observe(headers, now);
        }
    }

    /// Settle a ticket whose response was a route-level 429
    pub fn complete_rate_limited(&self, ticket: Ticket, headers: &RateLimitHeaders, wait: Duration) {
        let bucket = Arc::clone(&ticket.bucket);
        let route = ticket.route.clone();
        self.complete(ticket, headers);

        let now = Instant::now();
        bucket.exhaust_for(wait, now);
        let current = self.bucket_for(&route);
        if !Arc::ptr_eq(&current, &bucket) {
            current.exhaust_for(wait, now);
        }
    }

    /// Map the route to the bucket the server named. Returns that bucket when it
    /// differs from the one the ticket was admitted on.
    fn rekey(&self, route: &Route, headers: &RateLimitHeaders, admitted: &Arc<Bucket>) -> Option<Arc<Bucket>> {
        let hash = headers.bucket.as_deref()?;
        let id = match route.major() {
            Some(major) => format!("{hash}:{major}"),
            None => hash.to_string(),
        };

        let previous = self.routes.insert(route.key().to_string(), id.clone());
        if previous.as_deref() != Some(id.as_str()) {
            tracing::debug!(route = %route, bucket = %id, "Route mapped to bucket");
        }

        let target = Arc::clone(
            self.buckets
                .entry(id)
                .or_insert_with(|| Arc::clone(admitted))
                .value(),
        );
        (!Arc::ptr_eq(&target, admitted)).then_some(target)
    }

    /// Fail queued and future acquisitions
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// One admitted request
///
/// Dropping a ticket that was never sent gives its unit of capacity back.
/// Dropping one after the request went out keeps the decrement, since the
/// server may already have counted it.
#[derive(Debug)]
#[must_use = "dropping a ticket releases its admission"]
pub struct Ticket {
    route: Route,
    bucket: Arc<Bucket>,
    sent: bool,
    settled: bool,
}

impl Ticket {
    fn new(route: Route, bucket: Arc<Bucket>) -> Self {
        Self {
            route,
            bucket,
            sent: false,
            settled: false,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Record that the request is about to hit the wire
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.settled {
            tracing::trace!(route = %self.route, sent = self.sent, "Ticket released without response");
            self.bucket.release(self.sent);
        }
    }
}
