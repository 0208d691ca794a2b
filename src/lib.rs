pub mod error;
pub mod event;
pub mod feed;
pub mod integration;
pub mod message;
pub mod post;
pub mod thread;
pub mod user;

pub type Result<T> = std::result::Result<T, error::Error>;
