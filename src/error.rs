use crate::{feed, integration};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Feed(#[from] feed::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
    #[error(transparent)]
    _Io(#[from] std::io::Error),
}
