use log::debug;
use tokio::task::JoinHandle;

use crate::thread;

/// Live realtime channel of one thread. The channel is closed by
/// [`Subscription::unsubscribe`] or when the handle is dropped.
pub struct Subscription {
    thread_id: thread::Id,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(super) fn new(thread_id: thread::Id, task: JoinHandle<()>) -> Self {
        Self { thread_id, task }
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    /// `false` once the transport ended the stream or the task was torn down.
    pub fn is_open(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn unsubscribe(self) {
        debug!("unsubscribing from thread {}", self.thread_id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
