//! Which entity kinds the cache keeps

use bitflags::bitflags;
use shardline_common::CacheSettings;

bitflags! {
    /// Individually toggleable entity kinds
    ///
    /// Disabled kinds are never populated, whatever the inbound traffic.
    /// Every guild-scoped kind also needs `GUILDS`, since nested entities
    /// live under their guild's entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheKinds: u16 {
        const GUILDS           = 1 << 0;
        const CHANNELS         = 1 << 1;
        const ROLES            = 1 << 2;
        const MEMBERS          = 1 << 3;
        const USERS            = 1 << 4;
        const VOICE_STATES     = 1 << 5;
        const MESSAGES         = 1 << 6;
        const PRIVATE_CHANNELS = 1 << 7;
    }
}

impl CacheKinds {
    /// Look up a kind by its configuration name
    pub fn from_config_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_lowercase().as_str() {
            "guilds" => Self::GUILDS,
            "channels" => Self::CHANNELS,
            "roles" => Self::ROLES,
            "members" => Self::MEMBERS,
            "users" => Self::USERS,
            "voice_states" | "voice" => Self::VOICE_STATES,
            "messages" => Self::MESSAGES,
            "private_channels" | "dms" => Self::PRIVATE_CHANNELS,
            _ => return None,
        };
        Some(kind)
    }
}

impl Default for CacheKinds {
    fn default() -> Self {
        Self::all()
    }
}

/// Cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub kinds: CacheKinds,
    /// Messages kept per channel; the oldest is evicted first
    pub message_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kinds: CacheKinds::all(),
            message_capacity: 100,
        }
    }
}

impl CacheConfig {
    pub fn with_kinds(kinds: CacheKinds) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    #[inline]
    pub fn caches(&self, kind: CacheKinds) -> bool {
        self.kinds.contains(kind)
    }
}

impl TryFrom<&CacheSettings> for CacheConfig {
    type Error = CacheError;

    fn try_from(settings: &CacheSettings) -> Result<Self, Self::Error> {
        let mut kinds = CacheKinds::all();
        for name in &settings.disabled {
            let kind = CacheKinds::from_config_name(name)
                .ok_or_else(|| CacheError::UnknownKind(name.clone()))?;
            kinds.remove(kind);
        }
        Ok(Self {
            kinds,
            message_capacity: settings.message_capacity,
        })
    }
}

/// Cache configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Unknown cache kind: {0}")]
    UnknownKind(String),
}
