use async_trait::async_trait;

use crate::{thread, user};

use super::{
    Id,
    model::{Message, NewMessage},
};

#[async_trait]
pub trait MessageRepository {
    /// All messages of a thread, oldest first.
    async fn find_by_thread(&self, thread_id: &thread::Id) -> super::Result<Vec<Message>>;

    /// Returns the stored row with its backend-assigned id and timestamp.
    async fn insert(&self, new: &NewMessage) -> super::Result<Message>;

    async fn delete(&self, id: &Id, sender_id: &user::Id) -> super::Result<()>;
}
