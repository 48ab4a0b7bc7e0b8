use crate::session;
use thiserror::Error;

mod feed;
mod filler;
mod method;
mod service;

pub use self::feed::DripFeed;
pub use self::filler::Filler;
pub use self::method::{MethodClass, TrapMethod};
pub use self::service::{Tarpit, TrapBody};

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error")]
    Http(#[from] hyper::http::Error),

    #[error("content type parse")]
    ContentTypeParse(#[from] mime::FromStrError),

    #[error("method {0} is not trapped")]
    Rejected(String),

    #[error("session refused")]
    Session(#[from] session::Error),

    #[error("request reached the tarpit without client metadata")]
    MissingMetadata,
}
