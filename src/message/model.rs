use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{post, thread, user};

use super::Id;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Message {
    id: Id,
    thread_id: thread::Id,
    sender_id: user::Id,
    receiver_id: user::Id,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_id: Option<post::Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_title: Option<String>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Local placeholder shown while `new` is being persisted.
    pub fn pending(new: &NewMessage, created_at: DateTime<Utc>) -> Self {
        Self::new(Id::temp(), new, created_at)
    }

    pub fn new(id: Id, new: &NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            thread_id: new.thread_id.clone(),
            sender_id: new.sender_id.clone(),
            receiver_id: new.receiver_id.clone(),
            text: new.text.clone(),
            post_id: new.post_id.clone(),
            post_title: None,
            created_at,
        }
    }

    pub fn with_post_title(self, title: impl Into<String>) -> Self {
        Self {
            post_title: Some(title.into()),
            ..self
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
    }

    pub const fn receiver_id(&self) -> &user::Id {
        &self.receiver_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn post_id(&self) -> Option<&post::Id> {
        self.post_id.as_ref()
    }

    pub fn post_title(&self) -> Option<&str> {
        self.post_title.as_deref()
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_temp()
    }
}

/// Validated insert payload.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    thread_id: thread::Id,
    sender_id: user::Id,
    receiver_id: user::Id,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<post::Id>,
}

impl NewMessage {
    /// Returns `None` for blank text or a missing receiver.
    pub fn new(
        thread_id: &thread::Id,
        sender_id: &user::Id,
        receiver_id: Option<&user::Id>,
        text: &str,
        post_id: Option<&post::Id>,
    ) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            thread_id: thread_id.clone(),
            sender_id: sender_id.clone(),
            receiver_id: receiver_id?.clone(),
            text: text.to_owned(),
            post_id: post_id.cloned(),
        })
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
