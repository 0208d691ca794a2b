use serde::{Deserialize, Serialize};

use super::Id;

/// Display metadata for a participant. Only used for rendering.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    id: Id,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
}

impl UserInfo {
    pub fn new(id: Id, email: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            avatar,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }
}
