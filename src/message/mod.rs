use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repository::MessageRepository;

pub mod model;
pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;

/// Either the backend-issued id or a local placeholder for an unconfirmed send.
/// Placeholders are never sent to the backend, so `Persisted` is listed first
/// and is what deserialization yields.
#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(untagged)]
pub enum Id {
    Persisted(Uuid),
    Temp(Uuid),
}

impl Id {
    pub fn random() -> Self {
        Self::Persisted(Uuid::new_v4())
    }

    pub fn temp() -> Self {
        Self::Temp(Uuid::new_v4())
    }

    pub const fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self::Persisted(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Temp(id) => write!(f, "tmp-{id}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0}")]
    NotFound(Id),
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("backend unavailable")]
    Unavailable,
}

impl Error {
    /// Text the backend supplied with the failure, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected(msg) if !msg.trim().is_empty() => Some(msg),
            _ => None,
        }
    }
}
