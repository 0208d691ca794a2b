use crate::{event, message, user};

pub mod markup;
pub mod model;
pub mod service;
mod subscription;

pub use model::{Disposition, Feed};
pub use service::FeedController;
pub use subscription::Subscription;

type Result<T> = std::result::Result<T, Error>;

const GENERIC_ALERT: &str = "Something went wrong";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not a message owner")]
    NotOwner,
    #[error("message is not persisted yet: {0}")]
    NotPersisted(message::Id),
    #[error("could not send message")]
    SendFailed(#[source] message::Error),
    #[error("could not delete message")]
    DeleteFailed(#[source] message::Error),

    #[error(transparent)]
    _Event(#[from] event::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
}

impl Error {
    /// Text for the blocking alert shown to the user.
    pub fn alert(&self) -> String {
        match self {
            Self::SendFailed(e) | Self::DeleteFailed(e) => {
                e.backend_message().unwrap_or(GENERIC_ALERT).to_owned()
            }
            Self::NotOwner => "Only the sender can delete this message".to_owned(),
            Self::NotPersisted(_) => "This message is still being sent".to_owned(),
            Self::_Event(_) | Self::_User(_) => GENERIC_ALERT.to_owned(),
        }
    }
}
