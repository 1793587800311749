use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionError;

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredentials(String),
    #[error("client error: {0}")]
    Client(String),
    #[error("session restore rejected: {0}")]
    Restore(String),
    #[error("login failed: {0}")]
    Login(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}
