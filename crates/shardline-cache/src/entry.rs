//! Per-guild entry owning every guild-scoped entity

use shardline_core::{Channel, Guild, Member, Message, Role, Snowflake, VoiceState};
use std::collections::{HashMap, VecDeque};

/// A cached guild and everything nested beneath it
#[derive(Debug, Clone)]
pub(crate) struct GuildEntry {
    pub(crate) guild: Guild,
    pub(crate) channels: HashMap<Snowflake, Channel>,
    pub(crate) roles: HashMap<Snowflake, Role>,
    pub(crate) members: HashMap<Snowflake, Member>,
    pub(crate) voice_states: HashMap<Snowflake, VoiceState>,
    pub(crate) messages: HashMap<Snowflake, VecDeque<Message>>,
}

impl GuildEntry {
    pub(crate) fn new(guild: Guild) -> Self {
        Self {
            guild,
            channels: HashMap::new(),
            roles: HashMap::new(),
            members: HashMap::new(),
            voice_states: HashMap::new(),
            messages: HashMap::new(),
        }
    }
}

/// Bounded ring of recent messages in one channel, oldest first
pub(crate) trait MessageRing {
    /// Insert or replace by id, evicting the oldest beyond `capacity`.
    fn put(&mut self, message: Message, capacity: usize);
    fn find(&self, message_id: Snowflake) -> Option<&Message>;
    fn find_mut(&mut self, message_id: Snowflake) -> Option<&mut Message>;
    fn take(&mut self, message_id: Snowflake) -> Option<Message>;
}

impl MessageRing for VecDeque<Message> {
    fn put(&mut self, message: Message, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if let Some(existing) = self.find_mut(message.id) {
            *existing = message;
            return;
        }
        self.push_back(message);
        while self.len() > capacity {
            self.pop_front();
        }
    }

    fn find(&self, message_id: Snowflake) -> Option<&Message> {
        self.iter().find(|m| m.id == message_id)
    }

    fn find_mut(&mut self, message_id: Snowflake) -> Option<&mut Message> {
        self.iter_mut().find(|m| m.id == message_id)
    }

    fn take(&mut self, message_id: Snowflake) -> Option<Message> {
        let index = self.iter().position(|m| m.id == message_id)?;
        self.remove(index)
    }
}
