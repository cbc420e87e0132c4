//! Flat user store with reference tracking
//!
//! A user stays cached while anything still refers to it: a member in some
//! guild, a private channel it is a recipient of, the session's own account,
//! or an explicit pin from the consumer. Dropping the last reference evicts it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shardline_core::{Snowflake, User, UserPatch};
use std::collections::HashSet;

/// Something holding a user in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRef {
    Member(Snowflake),
    Recipient(Snowflake),
    CurrentUser,
    Pinned,
}

#[derive(Debug)]
struct CachedUser {
    user: User,
    refs: HashSet<UserRef>,
}

/// Users keyed by id; each entry is locked independently
#[derive(Debug, Default)]
pub(crate) struct UserStore {
    users: DashMap<Snowflake, CachedUser>,
}

impl UserStore {
    pub(crate) fn get(&self, user_id: Snowflake) -> Option<User> {
        self.users.get(&user_id).map(|entry| entry.user.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    pub(crate) fn ref_count(&self, user_id: Snowflake) -> usize {
        self.users.get(&user_id).map_or(0, |entry| entry.refs.len())
    }

    /// Insert or refresh a user and record a reference. Idempotent per reference.
    pub(crate) fn acquire(&self, user: User, by: UserRef) {
        match self.users.entry(user.id) {
            Entry::Occupied(mut occupied) => {
                let cached = occupied.get_mut();
                cached.user = user;
                cached.refs.insert(by);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedUser {
                    user,
                    refs: HashSet::from([by]),
                });
            }
        }
    }

    /// Drop a reference; the user is evicted once nothing refers to it.
    pub(crate) fn release(&self, user_id: Snowflake, by: UserRef) -> Option<User> {
        let removed = self.users.remove_if_mut(&user_id, |_, cached| {
            cached.refs.remove(&by);
            cached.refs.is_empty()
        });
        if removed.is_some() {
            tracing::trace!(user_id = %user_id, "User evicted (no remaining references)");
        }
        removed.map(|(_, cached)| cached.user)
    }

    /// Replace a tracked user's data. Untracked users are not added.
    pub(crate) fn replace(&self, user: User) -> Option<User> {
        self.users
            .get_mut(&user.id)
            .map(|mut cached| std::mem::replace(&mut cached.user, user))
    }

    /// Merge a partial user into a tracked user, returning (old, new).
    pub(crate) fn patch(&self, patch: &UserPatch) -> Option<(User, User)> {
        self.users.get_mut(&patch.id).map(|mut cached| {
            let old = cached.user.clone();
            cached.user.apply_patch(patch);
            (old, cached.user.clone())
        })
    }
}
