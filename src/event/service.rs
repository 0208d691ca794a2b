use async_trait::async_trait;

use crate::thread;

use super::model::EventStream;

#[async_trait]
pub trait EventService {
    /// Opens a standing channel for `thread_id`.
    ///
    /// Delivery is at-least-once and not ordered relative to direct
    /// responses. Dropping the stream closes the channel.
    async fn subscribe(&self, thread_id: &thread::Id) -> super::Result<EventStream>;
}
