//! Shard coordinator
//!
//! Spawns every shard, supervises them, and merges their events into one
//! stream. Shards that panic are restarted with a fresh session; shards that
//! close fatally are reported and, depending on policy, take the rest down.

use futures::FutureExt;
use parking_lot::RwLock;
use shardline_common::{ClientConfig, FatalShardPolicy};
use shardline_core::{Event, ShardEvent, Snowflake};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};

use super::{EventStream, HandshakeGate};
use crate::dispatcher::Dispatcher;
use crate::error::CoordinatorError;
use crate::shard::{Shard, ShardCommand, ShardConfig, ShardContext, ShardExit, ShardHandle, ShardState};
use crate::transport::GatewayTransport;

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub shard_count: u32,
    /// Handshakes allowed in flight at once
    pub concurrency: u32,
    /// Minimum spacing between handshake admissions
    pub identify_interval: Duration,
    pub on_fatal: FatalShardPolicy,
    /// Grace period for shards to close before they are aborted
    pub shutdown_timeout: Duration,
    /// Capacity of the event queue shared by all shards
    pub event_buffer: usize,
    /// Settings shared by every shard; `shard_id` is filled in per shard
    pub shard: ShardConfig,
}

impl CoordinatorConfig {
    pub fn from_client(
        config: &ClientConfig,
        shard_count: u32,
        concurrency: u32,
        gateway_url: impl Into<String>,
    ) -> Self {
        Self {
            shard_count,
            concurrency,
            identify_interval: config.sharding.identify_interval,
            on_fatal: config.sharding.on_fatal,
            shutdown_timeout: config.shutdown_timeout,
            event_buffer: config.gateway.event_buffer,
            shard: ShardConfig::from_client(config, 0, shard_count, gateway_url),
        }
    }
}

type ShardTable = Arc<RwLock<BTreeMap<u32, ShardHandle>>>;
type SupervisorResult = Result<(), CoordinatorError>;

/// Owns the shards of one client
pub struct Coordinator {
    shard_count: u32,
    shards: ShardTable,
    gate: Arc<HandshakeGate>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_timeout: Duration,
    supervisor: Mutex<Option<JoinHandle<SupervisorResult>>>,
    /// Reachable while `wait` holds the supervisor lock
    supervisor_abort: AbortHandle,
}

impl Coordinator {
    /// Spawn all shards. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::NoShards`] if `shard_count` is zero
    pub fn start(
        config: CoordinatorConfig,
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<(Self, EventStream), CoordinatorError> {
        if config.shard_count == 0 {
            return Err(CoordinatorError::NoShards);
        }

        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let gate = Arc::new(HandshakeGate::new(config.concurrency, config.identify_interval));

        let ctx = ShardContext {
            transport,
            gate: Arc::clone(&gate),
            dispatcher,
            events: events_tx,
            shutdown: shutdown_rx,
        };

        let shards: ShardTable = Arc::default();
        let mut tasks = JoinSet::new();
        for shard_id in 0..config.shard_count {
            spawn_shard(&mut tasks, &shards, config.shard.for_shard(shard_id), ctx.clone());
        }

        tracing::info!(
            shards = config.shard_count,
            concurrency = config.concurrency,
            "Shards started"
        );

        let supervisor = Supervisor {
            tasks,
            shards: Arc::clone(&shards),
            shard_config: config.shard.clone(),
            ctx,
            on_fatal: config.on_fatal,
            shutdown_tx: shutdown_tx.clone(),
            gate: Arc::clone(&gate),
        };

        let supervisor = tokio::spawn(supervisor.run());
        let coordinator = Self {
            shard_count: config.shard_count,
            shards,
            gate,
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout,
            supervisor_abort: supervisor.abort_handle(),
            supervisor: Mutex::new(Some(supervisor)),
        };
        Ok((coordinator, EventStream::new(events_rx)))
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Shard that owns a guild
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        guild_id.shard_index(self.shard_count)
    }

    pub fn shard(&self, shard_id: u32) -> Option<ShardHandle> {
        self.shards.read().get(&shard_id).cloned()
    }

    /// Current state of every live shard, by id
    pub fn shard_states(&self) -> Vec<(u32, ShardState)> {
        self.shards
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.state()))
            .collect()
    }

    /// Handshakes currently in flight
    pub fn handshakes_in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Highest number of simultaneous handshakes seen
    pub fn max_handshakes_in_flight(&self) -> usize {
        self.gate.max_in_flight()
    }

    /// Queue a command on a shard
    pub async fn send(&self, shard_id: u32, command: ShardCommand) -> Result<(), CoordinatorError> {
        let handle = self
            .shard(shard_id)
            .ok_or(CoordinatorError::ShardUnavailable(shard_id))?;
        handle
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ShardUnavailable(shard_id))
    }

    /// Queue a command on the shard owning `guild_id`
    pub async fn send_to_guild(
        &self,
        guild_id: Snowflake,
        command: ShardCommand,
    ) -> Result<(), CoordinatorError> {
        self.send(self.shard_for_guild(guild_id), command).await
    }

    /// Wait until every shard has stopped on its own.
    ///
    /// Returns the fatal failure that stopped the client, if any.
    pub async fn wait(&self) -> Result<(), CoordinatorError> {
        let mut supervisor = self.supervisor.lock().await;
        let Some(handle) = supervisor.as_mut() else {
            return Ok(());
        };
        let result = join_supervisor(handle).await;
        *supervisor = None;
        result
    }

    /// Stop admitting shards, close every connection, and wait for the
    /// shards to finish. Shards still running after the timeout are aborted,
    /// even while another task is blocked in [`Coordinator::wait`].
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        tracing::info!("Shutting down shards");
        self.gate.close();
        self.shutdown_tx.send_replace(true);

        let joined = tokio::time::timeout(self.shutdown_timeout, async {
            let mut supervisor = self.supervisor.lock().await;
            let Some(handle) = supervisor.as_mut() else {
                return Ok(());
            };
            let result = join_supervisor(handle).await;
            *supervisor = None;
            result
        })
        .await;

        let result = joined.unwrap_or_else(|_| {
            tracing::warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Shards did not close in time, aborting"
            );
            // Dropping the supervisor's JoinSet aborts every shard task
            self.supervisor_abort.abort();
            Ok(())
        });
        self.shards.write().clear();
        result
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.gate.close();
        self.shutdown_tx.send_replace(true);
    }
}

async fn join_supervisor(handle: &mut JoinHandle<SupervisorResult>) -> SupervisorResult {
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "Shard supervisor panicked");
            Err(CoordinatorError::Shutdown)
        }
    }
}

type ShardOutcome = (u32, std::thread::Result<ShardExit>);

fn spawn_shard(
    tasks: &mut JoinSet<ShardOutcome>,
    shards: &ShardTable,
    config: ShardConfig,
    ctx: ShardContext,
) {
    let shard_id = config.shard_id;
    let (shard, handle) = Shard::new(config, ctx);
    shards.write().insert(shard_id, handle);
    tasks.spawn(async move {
        let outcome = AssertUnwindSafe(shard.run()).catch_unwind().await;
        (shard_id, outcome)
    });
}

/// Background task owning the shard tasks
struct Supervisor {
    tasks: JoinSet<ShardOutcome>,
    shards: ShardTable,
    shard_config: ShardConfig,
    ctx: ShardContext,
    on_fatal: FatalShardPolicy,
    shutdown_tx: watch::Sender<bool>,
    gate: Arc<HandshakeGate>,
}

impl Supervisor {
    async fn run(mut self) -> SupervisorResult {
        let mut failure = None;

        while let Some(joined) = self.tasks.join_next().await {
            let (shard_id, outcome) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    // Only reachable through abort; shard ids are not recoverable here
                    tracing::debug!(error = %e, "Shard task cancelled");
                    continue;
                }
            };

            match outcome {
                Ok(ShardExit::Shutdown) => {
                    self.shards.write().remove(&shard_id);
                }
                Ok(ShardExit::Fatal { close_code, reason }) => {
                    self.shards.write().remove(&shard_id);
                    tracing::error!(
                        shard_id,
                        close_code = ?close_code,
                        reason = %reason,
                        "Shard failed permanently"
                    );

                    let event = ShardEvent::new(
                        shard_id,
                        Event::ShardFailed {
                            close_code,
                            reason: reason.clone(),
                        },
                    );
                    if self.ctx.events.send(event).await.is_err() {
                        tracing::debug!(shard_id, "No consumer for shard failure");
                    }

                    if self.on_fatal == FatalShardPolicy::ShutdownAll && failure.is_none() {
                        tracing::error!(shard_id, "Stopping all shards after fatal failure");
                        self.gate.close();
                        self.shutdown_tx.send_replace(true);
                        failure = Some(CoordinatorError::ShardFailed {
                            shard_id,
                            close_code,
                            reason,
                        });
                    }
                }
                Err(_) if *self.shutdown_tx.borrow() => {
                    self.shards.write().remove(&shard_id);
                }
                Err(_) => {
                    tracing::error!(shard_id, "Shard panicked, restarting with a fresh session");
                    spawn_shard(
                        &mut self.tasks,
                        &self.shards,
                        self.shard_config.for_shard(shard_id),
                        self.ctx.clone(),
                    );
                }
            }
        }

        tracing::info!("All shards stopped");
        failure.map_or(Ok(()), Err)
    }
}
