//! Process-local backend used by tests and the console.
//!
//! Rows live in memory; realtime events travel as JSON payloads over a
//! broadcast channel and are filtered per thread on the subscriber side.

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, warn};
use tokio::sync::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::event::{Event, EventStream, service::EventService};
use crate::message::model::{Message, NewMessage};
use crate::message::repository::MessageRepository;
use crate::user::{model::UserInfo, repository::UserRepository};
use crate::{event, message, post, thread, user};

const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct Config {
    event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    pub fn env() -> super::Result<Self> {
        Self::parse(env::var("REALTIME_BUFFER").ok())
    }

    fn parse(value: Option<String>) -> super::Result<Self> {
        let Some(value) = value else {
            return Ok(Self::default());
        };

        match value.parse::<usize>() {
            Ok(event_capacity) if event_capacity > 0 => Ok(Self { event_capacity }),
            _ => Err(super::Error::InvalidVar {
                name: "REALTIME_BUFFER",
                value,
            }),
        }
    }
}

/// Failure the next matching call should report.
#[derive(Clone, Debug)]
pub enum Fault {
    Unavailable,
    Rejected(String),
}

impl From<Fault> for message::Error {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Unavailable => Self::Unavailable,
            Fault::Rejected(msg) => Self::Rejected(msg),
        }
    }
}

#[derive(Default)]
struct Faults {
    find: Option<Fault>,
    insert: Option<Fault>,
    delete: Option<Fault>,
    subscribe: bool,
    user_lookup: bool,
    duplicate_events: bool,
}

#[derive(Clone)]
struct Change {
    thread_id: thread::Id,
    payload: Bytes,
}

pub struct InMemoryBackend {
    rows: RwLock<Vec<Message>>,
    post_titles: RwLock<HashMap<post::Id, String>>,
    users: RwLock<HashMap<user::Id, UserInfo>>,
    faults: RwLock<Faults>,
    changes: broadcast::Sender<Change>,
}

impl InMemoryBackend {
    pub fn new(config: &Config) -> Self {
        let (changes, _) = broadcast::channel(config.event_capacity);
        Self {
            rows: RwLock::new(Vec::new()),
            post_titles: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
            changes,
        }
    }

    pub async fn add_user(&self, info: UserInfo) {
        self.users.write().await.insert(info.id().clone(), info);
    }

    pub async fn add_post(&self, id: post::Id, title: impl Into<String>) {
        self.post_titles.write().await.insert(id, title.into());
    }
}

// fault injection
impl InMemoryBackend {
    pub async fn fail_next_find(&self, fault: Fault) {
        self.faults.write().await.find = Some(fault);
    }

    pub async fn fail_next_insert(&self, fault: Fault) {
        self.faults.write().await.insert = Some(fault);
    }

    pub async fn fail_next_delete(&self, fault: Fault) {
        self.faults.write().await.delete = Some(fault);
    }

    pub async fn fail_next_subscribe(&self) {
        self.faults.write().await.subscribe = true;
    }

    pub async fn fail_next_user_lookup(&self) {
        self.faults.write().await.user_lookup = true;
    }

    /// Delivers every event twice, as an at-least-once transport may.
    pub async fn set_duplicate_events(&self, duplicate: bool) {
        self.faults.write().await.duplicate_events = duplicate;
    }
}

impl InMemoryBackend {
    async fn publish(&self, thread_id: &thread::Id, event: &Event) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                error!("could not serialize event: {e:?}");
                return;
            }
        };

        let copies = if self.faults.read().await.duplicate_events {
            2
        } else {
            1
        };

        for _ in 0..copies {
            let change = Change {
                thread_id: thread_id.clone(),
                payload: payload.clone(),
            };
            if self.changes.send(change).is_err() {
                debug!("no realtime subscribers for thread {thread_id}");
            }
        }
    }
}

#[async_trait]
impl MessageRepository for InMemoryBackend {
    async fn find_by_thread(
        &self,
        thread_id: &thread::Id,
    ) -> Result<Vec<Message>, message::Error> {
        if let Some(fault) = self.faults.write().await.find.take() {
            return Err(fault.into());
        }

        let titles = self.post_titles.read().await;
        let mut messages = self
            .rows
            .read()
            .await
            .iter()
            .filter(|m| m.thread_id() == thread_id)
            .map(|m| match m.post_id().and_then(|id| titles.get(id)) {
                Some(title) => m.clone().with_post_title(title.as_str()),
                None => m.clone(),
            })
            .collect::<Vec<_>>();

        messages.sort_by_key(|m| *m.created_at());
        Ok(messages)
    }

    async fn insert(&self, new: &NewMessage) -> Result<Message, message::Error> {
        if let Some(fault) = self.faults.write().await.insert.take() {
            return Err(fault.into());
        }

        let message = Message::new(message::Id::random(), new, Utc::now());
        self.rows.write().await.push(message.clone());

        self.publish(
            message.thread_id(),
            &Event::Inserted {
                message: message.clone(),
            },
        )
        .await;

        Ok(message)
    }

    async fn delete(&self, id: &message::Id, sender_id: &user::Id) -> Result<(), message::Error> {
        if let Some(fault) = self.faults.write().await.delete.take() {
            return Err(fault.into());
        }

        let removed = {
            let mut rows = self.rows.write().await;
            let idx = rows
                .iter()
                .position(|m| m.id() == id)
                .ok_or_else(|| message::Error::NotFound(id.clone()))?;

            if rows[idx].sender_id() != sender_id {
                return Err(message::Error::Rejected(
                    "Only the sender can delete this message".to_owned(),
                ));
            }

            rows.remove(idx)
        };

        self.publish(removed.thread_id(), &Event::Deleted { id: id.clone() })
            .await;

        Ok(())
    }
}

#[async_trait]
impl EventService for InMemoryBackend {
    async fn subscribe(&self, thread_id: &thread::Id) -> Result<EventStream, event::Error> {
        if std::mem::take(&mut self.faults.write().await.subscribe) {
            return Err(event::Error::SubscriptionFailed(thread_id.clone()));
        }

        let mut rx = self.changes.subscribe();
        let thread_id = thread_id.clone();

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(change) if change.thread_id == thread_id => {
                        match serde_json::from_slice::<Event>(&change.payload) {
                            Ok(event) => yield event,
                            Err(e) => error!("failed to deserialize event: {e:?}"),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("subscriber of thread {thread_id} skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl UserRepository for InMemoryBackend {
    async fn find_by_ids(&self, ids: &[user::Id]) -> Result<Vec<UserInfo>, user::Error> {
        if std::mem::take(&mut self.faults.write().await.user_lookup) {
            return Err(user::Error::Unavailable);
        }

        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}
