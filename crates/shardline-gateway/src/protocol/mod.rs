//! Gateway protocol definitions
//!
//! Op codes, the frame format, close codes, and the control payloads.

mod close_codes;
mod frame;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, CloseDisposition};
pub use frame::GatewayFrame;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdate,
    RequestGuildMembers, ResumePayload, Status, UpdateVoiceState,
};
