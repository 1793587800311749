use thiserror::Error;

use crate::browser::BrowserError;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("no content found after trying all query targets")]
    NoContent,
    #[error("no safe content left after filtering {rejected} candidates")]
    NoSafeContent { rejected: usize },
}
