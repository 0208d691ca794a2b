use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use log::{debug, error, warn};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use crate::event::Event;
use crate::message::model::{Message, NewMessage};
use crate::user::model::UserInfo;
use crate::{event, message, post, thread, user};

use super::model::{Disposition, Feed};
use super::subscription::Subscription;

#[derive(Default)]
struct State {
    feed: Feed,
    draft: String,
    subscription: Option<(thread::Id, AbortHandle)>,
}

impl State {
    /// Tears down the realtime task unless it serves `keep`.
    fn close_subscription(&mut self, keep: Option<&thread::Id>) {
        let stale = self
            .subscription
            .as_ref()
            .is_some_and(|(thread_id, _)| Some(thread_id) != keep);

        if let Some((thread_id, task)) = self.subscription.take_if(|_| stale) {
            debug!("closing realtime channel of thread {thread_id}");
            task.abort();
        }
    }
}

/// Keeps the message list of the thread on screen in sync with the backend.
///
/// Clones share the same feed, so the subscription task and the caller
/// mutate one list.
#[derive(Clone)]
pub struct FeedController {
    me: user::Id,
    message_repo: message::Repository,
    event_service: event::Service,
    user_repo: user::Repository,
    state: Arc<RwLock<State>>,
}

impl FeedController {
    pub fn new(
        me: user::Id,
        message_repo: message::Repository,
        event_service: event::Service,
        user_repo: user::Repository,
    ) -> Self {
        Self {
            me,
            message_repo,
            event_service,
            user_repo,
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl FeedController {
    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.feed.messages().to_vec()
    }

    pub async fn thread_id(&self) -> Option<thread::Id> {
        self.state.read().await.feed.thread_id().cloned()
    }

    pub async fn disposition(&self, temp_id: &message::Id) -> Option<Disposition> {
        self.state.read().await.feed.disposition(temp_id)
    }

    pub async fn subject_title(&self) -> Option<String> {
        self.state
            .read()
            .await
            .feed
            .subject_title()
            .map(ToOwned::to_owned)
    }
}

impl FeedController {
    /// Makes `thread_id` the active thread and seeds it from the backend.
    ///
    /// A failed load leaves an empty thread. A load overtaken by a later
    /// call is discarded. Switching threads closes the previous thread's
    /// subscription. Returns the list as it stands afterwards.
    pub async fn load_thread(&self, thread_id: &thread::Id) -> Vec<Message> {
        let generation = {
            let mut state = self.state.write().await;
            state.close_subscription(Some(thread_id));
            state.feed.enter(thread_id)
        };

        let loaded = self.message_repo.find_by_thread(thread_id).await;

        let mut state = self.state.write().await;
        let current = match loaded {
            Ok(messages) => {
                debug!("loaded {} messages of thread {thread_id}", messages.len());
                state.feed.replace(generation, messages)
            }
            Err(e) => {
                error!("failed to load thread {thread_id}: {e:?}");
                state.feed.clear(generation)
            }
        };

        if !current {
            debug!("discarding stale load of thread {thread_id}");
        }

        state.feed.messages().to_vec()
    }

    /// Streams the thread's insert and delete events into the feed until the
    /// returned handle is dropped or the controller moves to another thread.
    /// A new subscription replaces the previous one.
    pub async fn subscribe_to_thread(&self, thread_id: &thread::Id) -> super::Result<Subscription> {
        let mut stream = self.event_service.subscribe(thread_id).await?;

        let controller = self.clone();
        let channel = thread_id.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                controller.apply(&channel, event).await;
            }
            warn!("realtime channel of thread {channel} closed");
        });

        {
            let mut state = self.state.write().await;
            state.close_subscription(None);
            state.subscription = Some((thread_id.clone(), task.abort_handle()));
        }

        debug!("subscribed to thread {thread_id}");
        Ok(Subscription::new(thread_id.clone(), task))
    }

    /// Reconciles one realtime event received on `thread_id`'s channel.
    /// Returns whether the list changed.
    pub async fn apply(&self, thread_id: &thread::Id, event: Event) -> bool {
        let mut state = self.state.write().await;

        if !state.feed.is_active(thread_id) {
            debug!(
                "ignoring event for {} from inactive thread {thread_id}",
                event.message_id()
            );
            return false;
        }

        match event {
            Event::Inserted { message } => state.feed.merge(message),
            Event::Deleted { id } => state.feed.remove(&id),
        }
    }
}

// sending
impl FeedController {
    /// Shows the message immediately and reconciles it with the backend's
    /// answer.
    ///
    /// `Ok(None)` means the input was dropped without contacting the backend:
    /// blank text, no receiver, or a thread that is not active.
    pub async fn send_message(
        &self,
        thread_id: &thread::Id,
        receiver_id: Option<&user::Id>,
        text: &str,
        post_id: Option<&post::Id>,
    ) -> super::Result<Option<Disposition>> {
        match NewMessage::new(thread_id, &self.me, receiver_id, text, post_id) {
            Some(new) => self.send(new).await,
            None => {
                debug!("ignoring blank message or missing receiver");
                Ok(None)
            }
        }
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.state.write().await.draft = text.into();
    }

    pub async fn draft(&self) -> String {
        self.state.read().await.draft.clone()
    }

    /// Sends the composer's text. The composer is cleared when the send
    /// starts and gets the text back if the backend refuses it, unless
    /// something new was typed meanwhile. Input that is not sent stays in
    /// the composer.
    pub async fn send_draft(
        &self,
        thread_id: &thread::Id,
        receiver_id: Option<&user::Id>,
        post_id: Option<&post::Id>,
    ) -> super::Result<Option<Disposition>> {
        let (new, temp_id, typed) = {
            let mut state = self.state.write().await;
            let Some(new) = NewMessage::new(thread_id, &self.me, receiver_id, &state.draft, post_id)
            else {
                return Ok(None);
            };

            let placeholder = Message::pending(&new, Utc::now());
            let Some(temp_id) = state.feed.begin_send(placeholder) else {
                warn!("ignoring send to inactive thread {thread_id}");
                return Ok(None);
            };

            (new, temp_id, std::mem::take(&mut state.draft))
        };

        let result = self.settle(temp_id, &new).await;

        if result.is_err() {
            let mut state = self.state.write().await;
            if state.draft.is_empty() {
                state.draft = typed;
            }
        }

        result.map(Some)
    }

    async fn send(&self, new: NewMessage) -> super::Result<Option<Disposition>> {
        let placeholder = Message::pending(&new, Utc::now());
        let Some(temp_id) = self.state.write().await.feed.begin_send(placeholder) else {
            warn!("ignoring send to inactive thread {}", new.thread_id());
            return Ok(None);
        };

        self.settle(temp_id, &new).await.map(Some)
    }

    async fn settle(&self, temp_id: message::Id, new: &NewMessage) -> super::Result<Disposition> {
        match self.message_repo.insert(new).await {
            Ok(confirmed) => {
                let disposition = self.state.write().await.feed.confirm(&temp_id, confirmed);
                debug!("send {temp_id} settled as {disposition:?}");
                Ok(disposition)
            }
            Err(e) => {
                self.state.write().await.feed.roll_back(&temp_id);
                error!("failed to send message {temp_id}: {e:?}");
                Err(super::Error::SendFailed(e))
            }
        }
    }
}

// deleting
impl FeedController {
    /// Deletes one of the session user's own messages.
    ///
    /// Other users' messages are refused here without a backend request; the
    /// backend still enforces the same rule on its side.
    pub async fn delete_message(&self, message: &Message) -> super::Result<()> {
        if message.sender_id() != &self.me {
            warn!("refusing to delete message {} of another user", message.id());
            return Err(super::Error::NotOwner);
        }

        if message.is_pending() {
            return Err(super::Error::NotPersisted(message.id().clone()));
        }

        if let Err(e) = self.message_repo.delete(message.id(), &self.me).await {
            error!("failed to delete message {}: {e:?}", message.id());
            return Err(super::Error::DeleteFailed(e));
        }

        self.state.write().await.feed.remove(message.id());
        Ok(())
    }
}

// participants
impl FeedController {
    /// Display metadata of everyone who sent or received a visible message.
    pub async fn resolve_participants(&self) -> super::Result<HashMap<user::Id, UserInfo>> {
        let ids = {
            let state = self.state.read().await;
            state
                .feed
                .messages()
                .iter()
                .flat_map(|m| [m.sender_id().clone(), m.receiver_id().clone()])
                .collect::<BTreeSet<_>>()
        };

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = ids.into_iter().collect::<Vec<_>>();
        let infos = self.user_repo.find_by_ids(&ids).await?;

        Ok(infos
            .into_iter()
            .map(|info| (info.id().clone(), info))
            .collect())
    }
}
