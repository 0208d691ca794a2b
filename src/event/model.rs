use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::message::{self, model::Message};

/// Row-level change delivered on a thread's realtime channel.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Inserted { message: Message },
    Deleted { id: message::Id },
}

impl Event {
    pub const fn message_id(&self) -> &message::Id {
        match self {
            Self::Inserted { message } => message.id(),
            Self::Deleted { id } => id,
        }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;
