//! User entity - a platform account, shared by every guild it is a member of

use serde::{Deserialize, Serialize};

use crate::serde_ext::double_option;
use crate::value_objects::Snowflake;

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            global_name: None,
            avatar: None,
            bot: false,
        }
    }

    /// Name shown in clients: the global display name, or the username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Merge a partial update. Absent fields keep their cached values.
    pub fn apply_patch(&mut self, patch: &UserPatch) {
        if let Some(username) = &patch.username {
            self.username.clone_from(username);
        }
        if let Some(global_name) = &patch.global_name {
            self.global_name.clone_from(global_name);
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar.clone_from(avatar);
        }
        if let Some(bot) = patch.bot {
            self.bot = bot;
        }
    }
}

/// Partial user as sent in presence updates
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct UserPatch {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub global_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
    #[serde(default)]
    pub bot: Option<bool>,
}

impl UserPatch {
    /// Build a full user if the patch carries enough fields to stand alone.
    pub fn into_user(self) -> Option<User> {
        Some(User {
            id: self.id,
            username: self.username?,
            global_name: self.global_name.flatten(),
            avatar: self.avatar.flatten(),
            bot: self.bot.unwrap_or(false),
        })
    }
}

impl From<&User> for UserPatch {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: Some(user.username.clone()),
            global_name: Some(user.global_name.clone()),
            avatar: Some(user.avatar.clone()),
            bot: Some(user.bot),
        }
    }
}
