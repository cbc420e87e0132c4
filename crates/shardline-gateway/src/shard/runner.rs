//! Shard runner
//!
//! Drives one gateway connection through its lifecycle: admission, connect,
//! Hello, Identify or Resume, steady state, and reconnects. Frames are
//! handled one at a time; a frame's cache mutation and event are complete
//! before the next frame is read.

use rand::Rng;
use serde::Deserialize;
use shardline_core::ShardEvent;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};

use super::heartbeat::Heartbeater;
use super::{ShardConfig, ShardSession, ShardState};
use crate::coordinator::{HandshakeGate, HandshakePermit};
use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, TransportError};
use crate::events::ReadySession;
use crate::protocol::{
    CloseCode, CloseDisposition, GatewayFrame, OpCode, PresenceUpdate, RequestGuildMembers,
    UpdateVoiceState,
};
use crate::transport::{
    gateway_url, GatewayConnection, GatewayTransport, Inbound, CLOSE_NORMAL, CLOSE_RESUMABLE,
};

/// Consecutive undecodable frames tolerated before the connection is dropped
const MAX_PROTOCOL_ERRORS: u32 = 10;

/// Capacity of a shard's outbound command queue
const COMMAND_BUFFER_SIZE: usize = 32;

/// Bounds of the random wait before re-identifying after an invalid session
const REIDENTIFY_DELAY_MS: (u64, u64) = (1_000, 5_000);

/// Shared collaborators handed to every shard
#[derive(Clone)]
pub struct ShardContext {
    pub transport: Arc<dyn GatewayTransport>,
    pub gate: Arc<HandshakeGate>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: mpsc::Sender<ShardEvent>,
    pub shutdown: watch::Receiver<bool>,
}

/// Outbound gateway commands a consumer may send through a ready shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardCommand {
    UpdatePresence(PresenceUpdate),
    RequestGuildMembers(RequestGuildMembers),
    UpdateVoiceState(UpdateVoiceState),
}

impl ShardCommand {
    fn to_frame(&self) -> Result<GatewayFrame, serde_json::Error> {
        match self {
            Self::UpdatePresence(payload) => GatewayFrame::presence_update(payload),
            Self::RequestGuildMembers(payload) => GatewayFrame::request_guild_members(payload),
            Self::UpdateVoiceState(payload) => GatewayFrame::voice_state_update(payload),
        }
    }
}

/// How a shard task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardExit {
    /// Shutdown was requested, or nobody consumes events anymore
    Shutdown,
    /// The gateway rejected the shard permanently
    Fatal {
        close_code: Option<u16>,
        reason: String,
    },
}

/// Cheap handle to a running shard
#[derive(Debug, Clone)]
pub struct ShardHandle {
    shard_id: u32,
    commands: mpsc::Sender<ShardCommand>,
    state: watch::Receiver<ShardState>,
}

impl ShardHandle {
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn state(&self) -> ShardState {
        *self.state.borrow()
    }

    /// Queue a command; it is sent once the shard is ready.
    pub async fn send(&self, command: ShardCommand) -> Result<(), GatewayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GatewayError::Shutdown)
    }

    /// Wait until the shard reaches `target`. Fails if the shard task ended.
    pub async fn wait_for_state(&self, target: ShardState) -> Result<(), GatewayError> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::Shutdown)
    }
}

/// Why one connection attempt ended
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    ConsumerGone,
    Resume {
        reason: String,
    },
    Reidentify {
        delay: Option<Duration>,
        reason: String,
    },
    Fatal {
        close_code: Option<u16>,
        reason: String,
    },
}

/// What woke the connection loop
enum Step {
    Shutdown,
    HandshakeTimeout,
    Heartbeat,
    /// A consumer slot for the oldest pending event; `None` once the stream is gone
    Deliver(Option<mpsc::OwnedPermit<ShardEvent>>),
    Command(Option<ShardCommand>),
    Inbound(Option<Result<Inbound, TransportError>>),
}

/// State of the connection currently open
struct ActiveConnection {
    conn: Box<dyn GatewayConnection>,
    heartbeater: Option<Heartbeater>,
    /// Held until READY/RESUMED
    permit: Option<HandshakePermit>,
    deadline: Instant,
    protocol_errors: u32,
}

/// One gateway shard
pub struct Shard {
    config: ShardConfig,
    ctx: ShardContext,
    session: ShardSession,
    commands: mpsc::Receiver<ShardCommand>,
    commands_open: bool,
    state_tx: watch::Sender<ShardState>,
    /// Dispatched events not yet accepted by the consumer
    pending: VecDeque<ShardEvent>,
    reached_ready: bool,
}

impl Shard {
    pub fn new(config: ShardConfig, ctx: ShardContext) -> (Self, ShardHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (state_tx, state_rx) = watch::channel(ShardState::Disconnected);
        let session = ShardSession::new(config.shard_id, config.shard_count);
        let handle = ShardHandle {
            shard_id: config.shard_id,
            commands: commands_tx,
            state: state_rx,
        };

        let shard = Self {
            config,
            ctx,
            session,
            commands,
            commands_open: true,
            state_tx,
            pending: VecDeque::new(),
            reached_ready: false,
        };
        (shard, handle)
    }

    pub fn shard_id(&self) -> u32 {
        self.config.shard_id
    }

    pub fn session(&self) -> &ShardSession {
        &self.session
    }

    fn set_state(&mut self, state: ShardState) {
        if self.session.state() != state {
            tracing::debug!(
                shard_id = self.config.shard_id,
                from = %self.session.state(),
                to = %state,
                "Shard state changed"
            );
        }
        self.session.set_state(state);
        self.state_tx.send_replace(state);
    }

    /// Run until shutdown or a fatal close
    pub async fn run(mut self) -> ShardExit {
        let shard_id = self.config.shard_id;
        let mut attempt: u32 = 0;
        let mut shutdown = self.ctx.shutdown.clone();

        loop {
            self.reached_ready = false;
            let end = self.run_session().await;
            if self.reached_ready {
                attempt = 0;
            }

            let delay = match end {
                SessionEnd::Shutdown | SessionEnd::ConsumerGone => {
                    tracing::info!(shard_id, "Shard stopped");
                    self.set_state(ShardState::Disconnected);
                    return ShardExit::Shutdown;
                }
                SessionEnd::Fatal { close_code, reason } => {
                    tracing::error!(shard_id, close_code = ?close_code, reason = %reason, "Shard closed fatally");
                    self.session.clear();
                    self.set_state(ShardState::FatallyClosed);
                    return ShardExit::Fatal { close_code, reason };
                }
                SessionEnd::Resume { reason } => {
                    let delay = self.config.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        shard_id,
                        reason = %reason,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        resumable = self.session.can_resume(),
                        "Connection lost, reconnecting"
                    );
                    delay
                }
                SessionEnd::Reidentify { delay, reason } => {
                    self.session.clear();
                    let delay = delay.unwrap_or_else(|| self.config.backoff.delay_for_attempt(attempt));
                    tracing::warn!(
                        shard_id,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Session invalidated, identifying again"
                    );
                    delay
                }
            };
            attempt = attempt.saturating_add(1);

            self.set_state(ShardState::Reconnecting);
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => {
                    self.set_state(ShardState::Disconnected);
                    return ShardExit::Shutdown;
                }
                () = sleep(delay) => {}
            }
        }
    }

    /// One connection attempt, from admission until the connection ends
    async fn run_session(&mut self) -> SessionEnd {
        let shard_id = self.config.shard_id;
        let mut shutdown = self.ctx.shutdown.clone();

        self.set_state(ShardState::Connecting);
        let permit = tokio::select! {
            biased;
            () = wait_for_shutdown(&mut shutdown) => return SessionEnd::Shutdown,
            permit = self.ctx.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return SessionEnd::Shutdown,
            },
        };

        let deadline = Instant::now() + self.config.handshake_timeout;
        let base = match self.session.resume_url() {
            Some(url) if self.session.can_resume() => url,
            _ => self.config.gateway_url.as_str(),
        };
        let url = gateway_url(base, self.config.api_version);

        tracing::debug!(shard_id, url = %url, "Connecting");
        let connected = tokio::select! {
            biased;
            () = wait_for_shutdown(&mut shutdown) => return SessionEnd::Shutdown,
            () = sleep_until(deadline) => return SessionEnd::Resume { reason: "connect timed out".to_string() },
            connected = self.ctx.transport.connect(&url) => connected,
        };
        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => return SessionEnd::Resume { reason: e.to_string() },
        };

        tracing::info!(shard_id, "Connected");
        self.set_state(ShardState::AwaitingHello);

        let mut active = ActiveConnection {
            conn,
            heartbeater: None,
            permit: Some(permit),
            deadline,
            protocol_errors: 0,
        };

        loop {
            let handshaking = active.permit.is_some();
            let beating = active.heartbeater.is_some();
            let next_beat = active
                .heartbeater
                .map_or_else(far_future, |heartbeater| heartbeater.next_beat());
            let accepts_commands = self.commands_open && self.session.state().is_ready();
            let delivering = !self.pending.is_empty();
            let events = self.ctx.events.clone();

            let step = tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => Step::Shutdown,
                () = sleep_until(active.deadline), if handshaking => Step::HandshakeTimeout,
                () = sleep_until(next_beat), if beating => Step::Heartbeat,
                reserved = events.reserve_owned(), if delivering => Step::Deliver(reserved.ok()),
                command = self.commands.recv(), if accepts_commands => Step::Command(command),
                inbound = active.conn.recv(), if !delivering => Step::Inbound(inbound),
            };

            if let Some(end) = self.on_step(&mut active, step).await {
                return end;
            }
        }
    }

    async fn on_step(&mut self, active: &mut ActiveConnection, step: Step) -> Option<SessionEnd> {
        match step {
            Step::Shutdown => {
                if let Err(e) = active.conn.close(CLOSE_NORMAL).await {
                    tracing::debug!(shard_id = self.config.shard_id, error = %e, "Close failed");
                }
                Some(SessionEnd::Shutdown)
            }
            Step::HandshakeTimeout => {
                let _ = active.conn.close(CLOSE_RESUMABLE).await;
                Some(SessionEnd::Resume {
                    reason: "handshake timed out".to_string(),
                })
            }
            Step::Heartbeat => self.heartbeat(active).await,
            Step::Deliver(None) => {
                let _ = active.conn.close(CLOSE_NORMAL).await;
                Some(SessionEnd::ConsumerGone)
            }
            Step::Deliver(Some(slot)) => {
                if let Some(event) = self.pending.pop_front() {
                    slot.send(event);
                }
                None
            }
            Step::Command(Some(command)) => self.send_command(active, &command).await,
            Step::Command(None) => {
                self.commands_open = false;
                None
            }
            Step::Inbound(None) => Some(SessionEnd::Resume {
                reason: "connection ended".to_string(),
            }),
            Step::Inbound(Some(Err(e))) => Some(SessionEnd::Resume {
                reason: e.to_string(),
            }),
            Step::Inbound(Some(Ok(Inbound::Close { code, reason }))) => Some(Self::on_close(code, reason)),
            Step::Inbound(Some(Ok(Inbound::Text(text)))) => self.handle_text(active, &text).await,
        }
    }

    async fn heartbeat(&mut self, active: &mut ActiveConnection) -> Option<SessionEnd> {
        let now = Instant::now();
        let reading = self.pending.is_empty();
        let heartbeater = active.heartbeater.as_mut()?;
        if !reading {
            // Acks queue up behind the undelivered events
            heartbeater.beat_unchecked(now);
        } else if heartbeater.beat(now).is_err() {
            // Zombie connection: drop it without waiting for a close handshake
            tracing::warn!(
                shard_id = self.config.shard_id,
                "Heartbeat not acknowledged, dropping connection"
            );
            return Some(SessionEnd::Resume {
                reason: "heartbeat not acknowledged".to_string(),
            });
        }

        self.session.heartbeat_sent(now);
        tracing::trace!(shard_id = self.config.shard_id, seq = ?self.session.sequence(), "Heartbeat");
        self.send(active, &GatewayFrame::heartbeat(self.session.sequence()))
            .await
    }

    async fn send_command(
        &mut self,
        active: &mut ActiveConnection,
        command: &ShardCommand,
    ) -> Option<SessionEnd> {
        match command.to_frame() {
            Ok(frame) => self.send(active, &frame).await,
            Err(e) => {
                tracing::warn!(shard_id = self.config.shard_id, error = %e, "Failed to encode command");
                None
            }
        }
    }

    async fn send(&self, active: &mut ActiveConnection, frame: &GatewayFrame) -> Option<SessionEnd> {
        let result = match frame.to_json() {
            Ok(json) => active.conn.send(json).await.map_err(GatewayError::from),
            Err(e) => Err(GatewayError::Protocol(e.to_string())),
        };
        result.err().map(|e| SessionEnd::Resume {
            reason: e.to_string(),
        })
    }

    fn on_close(code: Option<u16>, reason: String) -> SessionEnd {
        let reason = match code.and_then(CloseCode::from_u16) {
            Some(code) if reason.is_empty() => code.to_string(),
            _ if reason.is_empty() => format!("closed with code {code:?}"),
            _ => reason,
        };
        match CloseDisposition::for_code(code) {
            CloseDisposition::Resume => SessionEnd::Resume { reason },
            CloseDisposition::Reidentify => SessionEnd::Reidentify {
                delay: None,
                reason,
            },
            CloseDisposition::Fatal => SessionEnd::Fatal {
                close_code: code,
                reason,
            },
        }
    }

    async fn handle_text(&mut self, active: &mut ActiveConnection, text: &str) -> Option<SessionEnd> {
        let frame = match GatewayFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => return self.protocol_error(active, format!("undecodable frame: {e}")).await,
        };
        tracing::trace!(shard_id = self.config.shard_id, frame = %frame, "Frame received");

        match frame.op {
            OpCode::Hello => self.on_hello(active, &frame).await,
            OpCode::Heartbeat => {
                // Answered at once; the schedule is unchanged
                self.send(active, &GatewayFrame::heartbeat(self.session.sequence()))
                    .await
            }
            OpCode::HeartbeatAck => {
                if let Some(heartbeater) = active.heartbeater.as_mut() {
                    heartbeater.ack();
                }
                self.session.heartbeat_acked(Instant::now());
                active.protocol_errors = 0;
                None
            }
            OpCode::Reconnect => {
                tracing::info!(shard_id = self.config.shard_id, "Gateway requested reconnect");
                let _ = active.conn.close(CLOSE_RESUMABLE).await;
                Some(SessionEnd::Resume {
                    reason: "reconnect requested".to_string(),
                })
            }
            OpCode::InvalidSession => {
                let resumable = frame.as_invalid_session().unwrap_or(false);
                let _ = active.conn.close(CLOSE_RESUMABLE).await;
                if resumable && self.session.can_resume() {
                    return Some(SessionEnd::Resume {
                        reason: "invalid session (resumable)".to_string(),
                    });
                }
                let (low, high) = REIDENTIFY_DELAY_MS;
                let delay = Duration::from_millis(rand::thread_rng().gen_range(low..=high));
                Some(SessionEnd::Reidentify {
                    delay: Some(delay),
                    reason: "invalid session".to_string(),
                })
            }
            OpCode::Dispatch => self.on_dispatch(active, frame).await,
            op => self.protocol_error(active, format!("unexpected op {op}")).await,
        }
    }

    async fn on_hello(&mut self, active: &mut ActiveConnection, frame: &GatewayFrame) -> Option<SessionEnd> {
        let Some(hello) = frame.as_hello() else {
            return self.protocol_error(active, "malformed Hello".to_string()).await;
        };

        let interval = Duration::from_millis(hello.heartbeat_interval);
        self.session.set_heartbeat_interval(interval);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        active.heartbeater = Some(Heartbeater::start(interval, Instant::now(), jitter));
        tracing::debug!(
            shard_id = self.config.shard_id,
            interval_ms = hello.heartbeat_interval,
            "Hello received"
        );

        let handshake = match (self.session.session_id(), self.session.sequence()) {
            (Some(session_id), Some(seq)) => {
                let payload = self.config.resume_payload(session_id, seq);
                self.set_state(ShardState::Resuming);
                GatewayFrame::resume(&payload)
            }
            _ => {
                self.set_state(ShardState::Identifying);
                GatewayFrame::identify(&self.config.identify_payload())
            }
        };

        match handshake {
            Ok(frame) => self.send(active, &frame).await,
            Err(e) => Some(SessionEnd::Resume {
                reason: format!("failed to encode handshake: {e}"),
            }),
        }
    }

    async fn on_dispatch(&mut self, active: &mut ActiveConnection, frame: GatewayFrame) -> Option<SessionEnd> {
        let shard_id = self.config.shard_id;
        if let Some(seq) = frame.s {
            self.session.record_sequence(seq);
        }
        let Some(event_name) = frame.t.clone() else {
            return self.protocol_error(active, "dispatch without event type".to_string()).await;
        };

        match event_name.as_str() {
            "READY" => match ReadySession::deserialize(&frame.d) {
                Ok(ready) => {
                    self.session.establish(ready);
                    self.handshake_complete(active);
                    tracing::info!(shard_id, session_id = ?self.session.session_id(), "Identified");
                }
                Err(e) => return self.protocol_error(active, format!("malformed READY: {e}")).await,
            },
            "RESUMED" => {
                self.handshake_complete(active);
                tracing::info!(shard_id, seq = ?self.session.sequence(), "Resumed");
            }
            _ => {}
        }

        match self.ctx.dispatcher.dispatch(
            shard_id,
            self.config.shard_count,
            &event_name,
            frame.d,
        ) {
            Ok(Some(event)) => self.pending.push_back(ShardEvent::new(shard_id, event)),
            Ok(None) => {}
            Err(e) => return self.protocol_error(active, e.to_string()).await,
        }
        active.protocol_errors = 0;
        None
    }

    fn handshake_complete(&mut self, active: &mut ActiveConnection) {
        active.permit = None;
        self.reached_ready = true;
        self.set_state(ShardState::Ready);
    }

    /// A frame that could not be used is dropped; the connection survives
    /// unless bad frames keep coming.
    async fn protocol_error(&mut self, active: &mut ActiveConnection, reason: String) -> Option<SessionEnd> {
        active.protocol_errors += 1;
        tracing::warn!(
            shard_id = self.config.shard_id,
            errors = active.protocol_errors,
            reason = %reason,
            "Dropped malformed frame"
        );
        if active.protocol_errors < MAX_PROTOCOL_ERRORS {
            return None;
        }
        let _ = active.conn.close(CLOSE_RESUMABLE).await;
        Some(SessionEnd::Resume {
            reason: "too many malformed frames".to_string(),
        })
    }
}

/// Resolves once shutdown is requested or the coordinator is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}
