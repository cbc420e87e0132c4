//! Per-shard session state
//!
//! The session id and sequence survive a resume; both are discarded when the
//! session is invalidated or the shard restarts.

use std::time::Duration;
use tokio::time::Instant;

use super::ShardState;
use crate::events::ReadySession;

/// Session state of one shard
#[derive(Debug, Clone)]
pub struct ShardSession {
    shard_id: u32,
    shard_count: u32,
    session_id: Option<String>,
    sequence: Option<u64>,
    resume_url: Option<String>,
    heartbeat_interval: Option<Duration>,
    last_heartbeat_sent: Option<Instant>,
    last_heartbeat_ack: Option<Instant>,
    state: ShardState,
}

impl ShardSession {
    pub fn new(shard_id: u32, shard_count: u32) -> Self {
        Self {
            shard_id,
            shard_count,
            session_id: None,
            sequence: None,
            resume_url: None,
            heartbeat_interval: None,
            last_heartbeat_sent: None,
            last_heartbeat_ack: None,
            state: ShardState::Disconnected,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ShardState) {
        self.state = state;
    }

    /// A resume needs both a session id and a sequence
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Record the sequence of a dispatch. Last write wins.
    pub fn record_sequence(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
    }

    /// Store the session READY established
    pub fn establish(&mut self, ready: ReadySession) {
        self.session_id = Some(ready.session_id);
        self.resume_url = ready.resume_gateway_url;
    }

    /// Forget the session; the next handshake identifies
    pub fn clear(&mut self) {
        self.session_id = None;
        self.sequence = None;
        self.resume_url = None;
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub(crate) fn set_heartbeat_interval(&mut self, interval: Duration) {
        self.heartbeat_interval = Some(interval);
    }

    pub(crate) fn heartbeat_sent(&mut self, at: Instant) {
        self.last_heartbeat_sent = Some(at);
    }

    pub(crate) fn heartbeat_acked(&mut self, at: Instant) {
        self.last_heartbeat_ack = Some(at);
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        let sent = self.last_heartbeat_sent?;
        let ack = self.last_heartbeat_ack?;
        (ack >= sent).then(|| ack - sent)
    }
}
