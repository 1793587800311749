use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{DiscoveryError, DiscoveryResult, SelectedMeme};
use crate::download::{DownloadError, DownloadResult, MediaDownloader};
use crate::publisher::{PublishError, PublishResult, Publisher};

pub type RunResult<T> = Result<T, RunError>;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

#[async_trait(?Send)]
pub trait DiscoverMedia {
    async fn discover(&self) -> DiscoveryResult<SelectedMeme>;
}

#[async_trait(?Send)]
pub trait FetchMedia {
    async fn fetch(&self, url: &str, dest: &Path) -> DownloadResult<u64>;
}

#[async_trait(?Send)]
pub trait PublishMedia {
    async fn publish(&mut self, media: &Path) -> PublishResult<()>;
}

#[async_trait(?Send)]
impl FetchMedia for MediaDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> DownloadResult<u64> {
        MediaDownloader::fetch(self, url, dest).await
    }
}

#[async_trait(?Send)]
impl PublishMedia for Publisher {
    async fn publish(&mut self, media: &Path) -> PublishResult<()> {
        Publisher::publish(self, media).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub url: String,
    pub bytes: u64,
    pub duration_ms: u64,
}

/// One full execution: discover → download to a uniquely named temp file →
/// publish. The temp file is removed on every outcome; cleanup failures are
/// logged and never shadow the run's own error.
pub struct RunOrchestrator {
    discoverer: Box<dyn DiscoverMedia>,
    fetcher: Box<dyn FetchMedia>,
    publisher: Box<dyn PublishMedia>,
    work_dir: PathBuf,
}

impl RunOrchestrator {
    pub fn new(
        discoverer: Box<dyn DiscoverMedia>,
        fetcher: Box<dyn FetchMedia>,
        publisher: Box<dyn PublishMedia>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            discoverer,
            fetcher,
            publisher,
            work_dir,
        }
    }

    pub async fn run_once(&mut self) -> RunResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(run_id = %run_id, "starting run");

        let meme = self.discoverer.discover().await?;
        info!(run_id = %run_id, url = %meme.url, target = %meme.query_target, "meme selected");

        let dest = self.temp_media_path();
        let outcome = self.download_and_publish(&meme, &dest).await;
        self.cleanup(&dest).await;
        let bytes = outcome?;

        let report = RunReport {
            run_id,
            url: meme.url,
            bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %report.run_id,
            bytes = report.bytes,
            duration_ms = report.duration_ms,
            "run complete"
        );
        Ok(report)
    }

    /// Epoch-millis naming keeps rapid retries from colliding.
    fn temp_media_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("meme_{}.jpg", Utc::now().timestamp_millis()))
    }

    async fn download_and_publish(&mut self, meme: &SelectedMeme, dest: &Path) -> RunResult<u64> {
        let bytes = self.fetcher.fetch(&meme.url, dest).await?;
        debug!(bytes, path = %dest.display(), "media staged for publishing");
        self.publisher.publish(dest).await?;
        Ok(bytes)
    }

    async fn cleanup(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "temp media removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove temp media"),
        }
    }
}
