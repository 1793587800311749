use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DownloadSection;

pub type DownloadResult<T> = Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0} fetching media")]
    Status(u16),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("downloaded bytes are not a decodable image: {0}")]
    InvalidImage(String),
}

/// Streams remote media straight to disk, then checks the bytes actually
/// decode as an image — a block page saved as `.jpg` must not reach the
/// publisher.
pub struct MediaDownloader {
    http: Client,
}

impl MediaDownloader {
    pub fn new(config: &DownloadSection) -> DownloadResult<Self> {
        let http = Client::builder()
            .user_agent("memeloop/0.1")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { http })
    }

    pub async fn fetch(&self, url: &str, dest: &Path) -> DownloadResult<u64> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut file = fs::File::create(dest)
            .await
            .map_err(|source| DownloadError::Io {
                source,
                path: dest.to_path_buf(),
            })?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            written += data.len() as u64;
            file.write_all(&data)
                .await
                .map_err(|source| DownloadError::Io {
                    source,
                    path: dest.to_path_buf(),
                })?;
        }
        file.flush().await.map_err(|source| DownloadError::Io {
            source,
            path: dest.to_path_buf(),
        })?;

        validate_image(dest)?;
        debug!(url = %url, bytes = written, path = %dest.display(), "media downloaded");
        Ok(written)
    }
}

fn validate_image(path: &Path) -> DownloadResult<()> {
    let reader = image::io::Reader::open(path)
        .map_err(|source| DownloadError::Io {
            source,
            path: path.to_path_buf(),
        })?
        .with_guessed_format()
        .map_err(|source| DownloadError::Io {
            source,
            path: path.to_path_buf(),
        })?;
    reader
        .decode()
        .map(|_| ())
        .map_err(|err| DownloadError::InvalidImage(err.to_string()))
}
