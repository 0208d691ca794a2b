use std::sync::Arc;

use service::EventService;

use crate::thread;

pub mod model;
pub mod service;

pub use model::{Event, EventStream};

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn EventService + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not subscribe to thread: {0}")]
    SubscriptionFailed(thread::Id),
}
