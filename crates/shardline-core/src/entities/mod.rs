//! Domain entities - the cached shapes of remote objects

mod channel;
mod guild;
mod member;
mod message;
mod role;
mod user;
mod voice_state;

pub use channel::{channel_type, Channel, ChannelKind, PrivateChannel, TextChannel, VoiceChannel};
pub use guild::{Guild, GuildPatch};
pub use member::{Member, MemberPatch};
pub use message::{Attachment, Message, MessageKind, MessagePatch};
pub use role::Role;
pub use user::{User, UserPatch};
pub use voice_state::VoiceState;
