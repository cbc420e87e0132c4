//! Gateway frame format
//!
//! Every message on the connection is one JSON frame: `{op, d, s, t}`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdate, RequestGuildMembers, ResumePayload,
    UpdateVoiceState,
};

/// A single gateway frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: OpCode,

    #[serde(default)]
    pub d: Value,

    /// Sequence number (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    fn control(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn with_payload(op: OpCode, payload: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::control(op, serde_json::to_value(payload)?))
    }

    // === Client Frames ===

    /// Heartbeat carrying the last sequence seen (`null` before any dispatch)
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::Identify, payload)
    }

    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::Resume, payload)
    }

    pub fn presence_update(payload: &PresenceUpdate) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::PresenceUpdate, payload)
    }

    pub fn request_guild_members(payload: &RequestGuildMembers) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::RequestGuildMembers, payload)
    }

    pub fn voice_state_update(payload: &UpdateVoiceState) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::VoiceStateUpdate, payload)
    }

    // === Server Frames ===

    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::control(OpCode::Hello, serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms }))
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, Value::Null)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, Value::Null)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    pub fn as_hello(&self) -> Option<HelloPayload> {
        self.payload_if(OpCode::Hello)
    }

    /// Resumability flag of an Invalid Session frame
    pub fn as_invalid_session(&self) -> Option<bool> {
        (self.op == OpCode::InvalidSession).then(|| self.d.as_bool().unwrap_or(false))
    }

    /// Decode `d` as `T`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.d)
    }

    fn payload_if<T: DeserializeOwned>(&self, op: OpCode) -> Option<T> {
        if self.op != op {
            return None;
        }
        self.payload().ok()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "GatewayFrame(op={}, t={t}, s={s})", self.op),
            (Some(t), None) => write!(f, "GatewayFrame(op={}, t={t})", self.op),
            _ => write!(f, "GatewayFrame(op={})", self.op),
        }
    }
}
