//! Entity cache
//!
//! Guild-scoped entities live inside their guild's [`GuildEntry`], so removing
//! the entry evicts all of them in one step. Users, private channels and their
//! messages live in flat maps that any shard may write; DashMap locks them per
//! key rather than per store.
//!
//! Lock rule: a guard on one map is never held while calling into another
//! map of this cache. Accessors return clones, so readers always see whole
//! entities.

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use shardline_core::{
    Channel, ChannelKind, Guild, GuildPatch, Member, MemberPatch, Message, MessagePatch, Role, Snowflake, User,
    UserPatch, VoiceState,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::{CacheConfig, CacheKinds};
use crate::entry::{GuildEntry, MessageRing};
use crate::users::{UserRef, UserStore};

/// Everything a full GUILD_CREATE carries
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub guild: Guild,
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    pub members: Vec<(Member, User)>,
    pub voice_states: Vec<VoiceState>,
}

impl GuildSnapshot {
    pub fn new(guild: Guild) -> Self {
        Self {
            guild,
            channels: Vec::new(),
            roles: Vec::new(),
            members: Vec::new(),
            voice_states: Vec::new(),
        }
    }
}

/// Entry counts, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub members: usize,
    pub users: usize,
    pub messages: usize,
}

/// In-memory store of remote entities
#[derive(Debug)]
pub struct EntityCache {
    config: CacheConfig,
    guilds: DashMap<Snowflake, GuildEntry>,
    /// Channel id -> owning guild, for lookups by channel alone
    channel_guilds: DashMap<Snowflake, Snowflake>,
    /// Guilds announced but not (or no longer) streamed in
    unavailable: DashSet<Snowflake>,
    users: UserStore,
    private_channels: DashMap<Snowflake, Channel>,
    private_messages: DashMap<Snowflake, VecDeque<Message>>,
    current_user: RwLock<Option<User>>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl EntityCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            guilds: DashMap::new(),
            channel_guilds: DashMap::new(),
            unavailable: DashSet::new(),
            users: UserStore::default(),
            private_channels: DashMap::new(),
            private_messages: DashMap::new(),
            current_user: RwLock::new(None),
        }
    }

    /// Create a new cache wrapped in Arc
    pub fn new_shared(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[inline]
    fn caches(&self, kind: CacheKinds) -> bool {
        self.config.caches(kind)
    }

    // === Guilds ===

    /// Record guilds announced by READY that will stream in later.
    pub fn mark_unavailable(&self, guild_ids: impl IntoIterator<Item = Snowflake>) {
        for guild_id in guild_ids {
            self.unavailable.insert(guild_id);
        }
    }

    pub fn is_unavailable(&self, guild_id: Snowflake) -> bool {
        self.unavailable.contains(&guild_id)
    }

    /// Store a full guild, replacing any previous state for it.
    ///
    /// Returns true when the guild was pending (announced as unavailable),
    /// i.e. it became available rather than being newly joined.
    pub fn insert_guild(&self, snapshot: GuildSnapshot) -> bool {
        let guild_id = snapshot.guild.id;
        let was_pending = self.unavailable.remove(&guild_id).is_some();
        if !self.caches(CacheKinds::GUILDS) {
            return was_pending;
        }

        // A full sync supersedes whatever was cached before.
        self.evict_guild(guild_id);

        let mut entry = GuildEntry::new(snapshot.guild);
        for mut channel in snapshot.channels {
            channel.guild_id = Some(guild_id);
            self.channel_guilds.insert(channel.id, guild_id);
            if self.caches(CacheKinds::CHANNELS) {
                entry.channels.insert(channel.id, channel);
            }
        }
        if self.caches(CacheKinds::ROLES) {
            entry.roles = snapshot.roles.into_iter().map(|r| (r.id, r)).collect();
        }
        if self.caches(CacheKinds::VOICE_STATES) {
            entry.voice_states = snapshot
                .voice_states
                .into_iter()
                .filter(VoiceState::is_connected)
                .map(|mut state| {
                    state.guild_id = Some(guild_id);
                    (state.user_id, state)
                })
                .collect();
        }
        if self.caches(CacheKinds::MEMBERS) {
            for (member, user) in snapshot.members {
                if self.caches(CacheKinds::USERS) {
                    self.users.acquire(user, UserRef::Member(guild_id));
                }
                entry.members.insert(member.user_id, member);
            }
        }

        tracing::debug!(
            guild_id = %guild_id,
            channels = entry.channels.len(),
            members = entry.members.len(),
            "Guild cached"
        );
        self.guilds.insert(guild_id, entry);
        was_pending
    }

    /// Evict a guild and everything nested in it.
    ///
    /// With `unavailable` set the guild is expected back and is marked pending.
    pub fn remove_guild(&self, guild_id: Snowflake, unavailable: bool) -> Option<Guild> {
        if unavailable {
            self.unavailable.insert(guild_id);
        } else {
            self.unavailable.remove(&guild_id);
        }
        self.evict_guild(guild_id).map(|entry| entry.guild)
    }

    fn evict_guild(&self, guild_id: Snowflake) -> Option<GuildEntry> {
        let (_, entry) = self.guilds.remove(&guild_id)?;
        self.channel_guilds.retain(|_, owner| *owner != guild_id);
        for user_id in entry.members.keys() {
            self.users.release(*user_id, UserRef::Member(guild_id));
        }
        tracing::debug!(guild_id = %guild_id, "Guild evicted");
        Some(entry)
    }

    /// Merge a GUILD_UPDATE, returning (old, new). `None` if not cached.
    pub fn update_guild(&self, patch: &GuildPatch) -> Option<(Guild, Guild)> {
        let mut entry = self.guilds.get_mut(&patch.id)?;
        let old = entry.guild.clone();
        entry.guild.apply_patch(patch);
        Some((old, entry.guild.clone()))
    }

    /// Drop guilds owned by `shard_id` that are not in `keep`.
    ///
    /// Used after a fresh READY: anything the shard no longer lists was left
    /// while the session was down.
    pub fn prune_shard_guilds(&self, shard_id: u32, shard_count: u32, keep: &HashSet<Snowflake>) {
        let stale: Vec<Snowflake> = self
            .guilds
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| id.shard_index(shard_count) == shard_id && !keep.contains(id))
            .collect();
        for guild_id in stale {
            self.remove_guild(guild_id, false);
        }
    }

    pub fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.get(&guild_id).map(|entry| entry.guild.clone())
    }

    pub fn guild_ids(&self) -> Vec<Snowflake> {
        self.guilds.iter().map(|entry| *entry.key()).collect()
    }

    // === Channels ===

    /// Insert or replace a channel. Guild channels for uncached guilds are dropped.
    pub fn upsert_channel(&self, channel: Channel, recipients: Vec<User>) -> Option<Channel> {
        match channel.guild_id {
            Some(guild_id) => {
                if !self.guilds.contains_key(&guild_id) {
                    tracing::debug!(guild_id = %guild_id, channel_id = %channel.id, "Channel for uncached guild dropped");
                    return None;
                }
                self.channel_guilds.insert(channel.id, guild_id);
                if !self.caches(CacheKinds::CHANNELS) {
                    return None;
                }
                let mut entry = self.guilds.get_mut(&guild_id)?;
                entry.channels.insert(channel.id, channel)
            }
            None => self.upsert_private_channel(channel, recipients),
        }
    }

    fn upsert_private_channel(&self, channel: Channel, recipients: Vec<User>) -> Option<Channel> {
        if !self.caches(CacheKinds::PRIVATE_CHANNELS) {
            return None;
        }
        let channel_id = channel.id;
        let reference = UserRef::Recipient(channel_id);
        let current: HashSet<Snowflake> = recipients.iter().map(|u| u.id).collect();
        if self.caches(CacheKinds::USERS) {
            for user in recipients {
                self.users.acquire(user, reference);
            }
        }

        let old = self.private_channels.insert(channel_id, channel);
        if let Some(old) = &old {
            for stale in recipient_ids(old).filter(|id| !current.contains(id)) {
                self.users.release(stale, reference);
            }
        }
        old
    }

    /// Remove a channel and its cached messages.
    pub fn remove_channel(&self, guild_id: Option<Snowflake>, channel_id: Snowflake) -> Option<Channel> {
        match guild_id {
            Some(guild_id) => {
                self.channel_guilds.remove(&channel_id);
                let mut entry = self.guilds.get_mut(&guild_id)?;
                entry.messages.remove(&channel_id);
                entry.channels.remove(&channel_id)
            }
            None => {
                self.private_messages.remove(&channel_id);
                let (_, channel) = self.private_channels.remove(&channel_id)?;
                for user_id in recipient_ids(&channel) {
                    self.users.release(user_id, UserRef::Recipient(channel_id));
                }
                Some(channel)
            }
        }
    }

    /// Look up any channel by id
    pub fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        if let Some(guild_id) = self.channel_guild(channel_id) {
            return self
                .guilds
                .get(&guild_id)
                .and_then(|entry| entry.channels.get(&channel_id).cloned());
        }
        self.private_channels
            .get(&channel_id)
            .map(|channel| channel.value().clone())
    }

    /// Guild that owns a channel, when known
    pub fn channel_guild(&self, channel_id: Snowflake) -> Option<Snowflake> {
        self.channel_guilds.get(&channel_id).map(|g| *g)
    }

    /// Channels of a guild; `None` when the guild is not cached
    pub fn guild_channels(&self, guild_id: Snowflake) -> Option<Vec<Channel>> {
        self.guilds
            .get(&guild_id)
            .map(|entry| entry.channels.values().cloned().collect())
    }

    // === Roles ===

    pub fn upsert_role(&self, guild_id: Snowflake, role: Role) -> Option<Role> {
        if !self.caches(CacheKinds::ROLES) {
            return None;
        }
        let mut entry = self.guilds.get_mut(&guild_id)?;
        entry.roles.insert(role.id, role)
    }

    /// Remove a role and strip it from every cached member.
    pub fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        let mut entry = self.guilds.get_mut(&guild_id)?;
        for member in entry.members.values_mut() {
            member.remove_role(role_id);
        }
        entry.roles.remove(&role_id)
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        self.guilds
            .get(&guild_id)
            .and_then(|entry| entry.roles.get(&role_id).cloned())
    }

    pub fn guild_roles(&self, guild_id: Snowflake) -> Option<Vec<Role>> {
        self.guilds
            .get(&guild_id)
            .map(|entry| entry.roles.values().cloned().collect())
    }

    // === Members ===

    /// Insert or replace a member; its user is refreshed and referenced.
    pub fn upsert_member(&self, member: Member, user: User) -> Option<Member> {
        let guild_id = member.guild_id;
        if !self.caches(CacheKinds::MEMBERS) || !self.guilds.contains_key(&guild_id) {
            self.users.replace(user);
            return None;
        }
        if self.caches(CacheKinds::USERS) {
            self.users.acquire(user, UserRef::Member(guild_id));
        }
        let user_id = member.user_id;
        let Some(mut entry) = self.guilds.get_mut(&guild_id) else {
            self.users.release(user_id, UserRef::Member(guild_id));
            return None;
        };
        entry.members.insert(user_id, member)
    }

    /// Insert a member only if none is cached yet. Returns true if inserted.
    pub fn insert_member_if_absent(&self, member: Member, user: User) -> bool {
        let present = self
            .guilds
            .get(&member.guild_id)
            .map(|entry| entry.members.contains_key(&member.user_id));
        match present {
            Some(false) if self.caches(CacheKinds::MEMBERS) => {
                self.upsert_member(member, user);
                true
            }
            _ => {
                self.users.replace(user);
                false
            }
        }
    }

    /// Merge a GUILD_MEMBER_UPDATE, returning (old, new).
    ///
    /// An uncached member is created from the patch. `None` if the guild is
    /// not cached or members are not kept.
    pub fn merge_member(
        &self,
        guild_id: Snowflake,
        user: User,
        patch: &MemberPatch,
    ) -> Option<(Option<Member>, Member)> {
        if !self.caches(CacheKinds::MEMBERS) || !self.guilds.contains_key(&guild_id) {
            self.users.replace(user);
            return None;
        }
        let user_id = user.id;
        if self.caches(CacheKinds::USERS) {
            self.users.acquire(user, UserRef::Member(guild_id));
        }
        let Some(mut entry) = self.guilds.get_mut(&guild_id) else {
            self.users.release(user_id, UserRef::Member(guild_id));
            return None;
        };
        let mut existed = true;
        let member = entry.members.entry(user_id).or_insert_with(|| {
            existed = false;
            Member::new(guild_id, user_id)
        });
        let old = existed.then(|| member.clone());
        member.apply_patch(patch);
        Some((old, member.clone()))
    }

    pub fn remove_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        let removed = self
            .guilds
            .get_mut(&guild_id)
            .and_then(|mut entry| entry.members.remove(&user_id));
        if removed.is_some() {
            self.users.release(user_id, UserRef::Member(guild_id));
        }
        removed
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.guilds
            .get(&guild_id)
            .and_then(|entry| entry.members.get(&user_id).cloned())
    }

    /// Members of a guild; `None` when the guild is not cached
    pub fn guild_members(&self, guild_id: Snowflake) -> Option<Vec<Member>> {
        self.guilds
            .get(&guild_id)
            .map(|entry| entry.members.values().cloned().collect())
    }

    // === Users ===

    pub fn user(&self, user_id: Snowflake) -> Option<User> {
        self.users.get(user_id)
    }

    /// Replace a tracked user's data (untracked users are not added)
    pub fn replace_user(&self, user: User) -> Option<User> {
        self.users.replace(user)
    }

    /// Merge a partial user into a tracked user, returning (old, new)
    pub fn patch_user(&self, patch: &UserPatch) -> Option<(User, User)> {
        self.users.patch(patch)
    }

    /// Hold a user in the cache regardless of membership
    pub fn pin_user(&self, user: User) {
        if self.caches(CacheKinds::USERS) {
            self.users.acquire(user, UserRef::Pinned);
        }
    }

    pub fn unpin_user(&self, user_id: Snowflake) {
        self.users.release(user_id, UserRef::Pinned);
    }

    /// Number of live references to a user
    pub fn user_refs(&self, user_id: Snowflake) -> usize {
        self.users.ref_count(user_id)
    }

    pub fn set_current_user(&self, user: User) -> Option<User> {
        if self.caches(CacheKinds::USERS) {
            self.users.acquire(user.clone(), UserRef::CurrentUser);
        }
        self.current_user.write().replace(user)
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user.read().clone()
    }

    // === Voice states ===

    /// Apply a voice state; a state without a channel removes the entry.
    pub fn upsert_voice_state(&self, state: VoiceState) -> Option<VoiceState> {
        if !self.caches(CacheKinds::VOICE_STATES) {
            return None;
        }
        let guild_id = state.guild_id?;
        let mut entry = self.guilds.get_mut(&guild_id)?;
        if state.is_connected() {
            entry.voice_states.insert(state.user_id, state)
        } else {
            entry.voice_states.remove(&state.user_id)
        }
    }

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<VoiceState> {
        self.guilds
            .get(&guild_id)
            .and_then(|entry| entry.voice_states.get(&user_id).cloned())
    }

    // === Messages ===

    /// Cache a new message and advance its channel's last message id.
    pub fn push_message(&self, message: Message) {
        let capacity = self.config.message_capacity;
        let keep = self.caches(CacheKinds::MESSAGES);
        match message.guild_id {
            Some(guild_id) => {
                let Some(mut entry) = self.guilds.get_mut(&guild_id) else {
                    return;
                };
                if let Some(channel) = entry.channels.get_mut(&message.channel_id) {
                    channel.set_last_message_id(message.id);
                }
                if keep {
                    entry
                        .messages
                        .entry(message.channel_id)
                        .or_default()
                        .put(message, capacity);
                }
            }
            None => {
                if let Some(mut channel) = self.private_channels.get_mut(&message.channel_id) {
                    channel.set_last_message_id(message.id);
                }
                if keep {
                    self.private_messages
                        .entry(message.channel_id)
                        .or_default()
                        .put(message, capacity);
                }
            }
        }
    }

    /// Merge a MESSAGE_UPDATE into a cached message, returning (old, new)
    pub fn update_message(&self, patch: &MessagePatch) -> Option<(Message, Message)> {
        self.with_messages(patch.guild_id, patch.channel_id, |ring| {
            let message = ring.find_mut(patch.id)?;
            let old = message.clone();
            message.apply_patch(patch);
            Some((old, message.clone()))
        })
        .flatten()
    }

    pub fn remove_message(
        &self,
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Option<Message> {
        self.with_messages(guild_id, channel_id, |ring| ring.take(message_id))
            .flatten()
    }

    /// Remove several messages, returning the ones that were cached
    pub fn remove_messages(
        &self,
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_ids: &[Snowflake],
    ) -> Vec<Message> {
        self.with_messages(guild_id, channel_id, |ring| {
            message_ids.iter().filter_map(|id| ring.take(*id)).collect()
        })
        .unwrap_or_default()
    }

    pub fn message(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Message> {
        let guild_id = self.channel_guild(channel_id);
        self.with_messages(guild_id, channel_id, |ring| ring.find(message_id).cloned())
            .flatten()
    }

    /// Cached messages of a channel, oldest first
    pub fn messages(&self, channel_id: Snowflake) -> Vec<Message> {
        let guild_id = self.channel_guild(channel_id);
        self.with_messages(guild_id, channel_id, |ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn with_messages<R>(
        &self,
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        f: impl FnOnce(&mut VecDeque<Message>) -> R,
    ) -> Option<R> {
        match guild_id {
            Some(guild_id) => {
                let mut entry = self.guilds.get_mut(&guild_id)?;
                entry.messages.get_mut(&channel_id).map(f)
            }
            None => self
                .private_messages
                .get_mut(&channel_id)
                .map(|mut ring| f(ring.value_mut())),
        }
    }

    // === Diagnostics ===

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            guilds: self.guilds.len(),
            unavailable_guilds: self.unavailable.len(),
            channels: self.private_channels.len(),
            users: self.users.len(),
            messages: self.private_messages.iter().map(|ring| ring.len()).sum(),
            ..CacheStats::default()
        };
        for entry in &self.guilds {
            stats.channels += entry.channels.len();
            stats.members += entry.members.len();
            stats.messages += entry.messages.values().map(VecDeque::len).sum::<usize>();
        }
        stats
    }
}

fn recipient_ids(channel: &Channel) -> impl Iterator<Item = Snowflake> + '_ {
    let ids: &[Snowflake] = match &channel.kind {
        ChannelKind::Direct(private) | ChannelKind::Group(private) => &private.recipient_ids,
        _ => &[],
    };
    ids.iter().copied()
}
