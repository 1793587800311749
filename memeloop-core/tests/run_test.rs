use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use memeloop_core::{
    DiscoverMedia, DiscoveryError, DiscoveryResult, DownloadError, DownloadResult, FetchMedia,
    PublishError, PublishMedia, PublishResult, RunError, RunOrchestrator, SelectedMeme,
};

struct StubDiscoverer {
    url: String,
}

#[async_trait(?Send)]
impl DiscoverMedia for StubDiscoverer {
    async fn discover(&self) -> DiscoveryResult<SelectedMeme> {
        Ok(SelectedMeme {
            url: self.url.clone(),
            query_target: "https://a.example/search".to_string(),
            selector: "img".to_string(),
        })
    }
}

struct FailingDiscoverer;

#[async_trait(?Send)]
impl DiscoverMedia for FailingDiscoverer {
    async fn discover(&self) -> DiscoveryResult<SelectedMeme> {
        Err(DiscoveryError::NoContent)
    }
}

#[derive(Clone)]
struct WritingFetcher {
    payload: Vec<u8>,
    fail: bool,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl WritingFetcher {
    fn new(payload: &[u8], fail: bool) -> Self {
        Self {
            payload: payload.to_vec(),
            fail,
            fetched: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait(?Send)]
impl FetchMedia for WritingFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> DownloadResult<u64> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(DownloadError::Status(503));
        }
        std::fs::write(dest, &self.payload).map_err(|source| DownloadError::Io {
            source,
            path: dest.to_path_buf(),
        })?;
        Ok(self.payload.len() as u64)
    }
}

#[derive(Clone)]
struct RecordingPublisher {
    fail: bool,
    saw_file: Arc<Mutex<Vec<bool>>>,
}

impl RecordingPublisher {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            saw_file: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait(?Send)]
impl PublishMedia for RecordingPublisher {
    async fn publish(&mut self, media: &Path) -> PublishResult<()> {
        self.saw_file.lock().unwrap().push(media.exists());
        if self.fail {
            return Err(PublishError::Upload("server rejected media".to_string()));
        }
        Ok(())
    }
}

fn temp_files(dir: &TempDir) -> Vec<PathBuf> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[tokio::test]
async fn run_once_publishes_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let fetcher = WritingFetcher::new(b"jpeg bytes", false);
    let publisher = RecordingPublisher::new(false);
    let saw_file = Arc::clone(&publisher.saw_file);
    let mut orchestrator = RunOrchestrator::new(
        Box::new(StubDiscoverer {
            url: "https://i.pinimg.com/originals/a.jpg".to_string(),
        }),
        Box::new(fetcher.clone()),
        Box::new(publisher),
        dir.path().to_path_buf(),
    );

    let report = orchestrator.run_once().await.unwrap();
    assert_eq!(report.url, "https://i.pinimg.com/originals/a.jpg");
    assert_eq!(report.bytes, b"jpeg bytes".len() as u64);
    assert_eq!(*saw_file.lock().unwrap(), vec![true]);
    assert!(
        temp_files(&dir).is_empty(),
        "temp media must be removed after a successful run"
    );
}

#[tokio::test]
async fn publish_failure_still_cleans_up_and_propagates() {
    let dir = TempDir::new().unwrap();
    let fetcher = WritingFetcher::new(b"jpeg bytes", false);
    let mut orchestrator = RunOrchestrator::new(
        Box::new(StubDiscoverer {
            url: "https://i.pinimg.com/originals/a.jpg".to_string(),
        }),
        Box::new(fetcher),
        Box::new(RecordingPublisher::new(true)),
        dir.path().to_path_buf(),
    );

    let err = orchestrator.run_once().await.unwrap_err();
    assert!(matches!(err, RunError::Publish(PublishError::Upload(_))));
    assert!(
        temp_files(&dir).is_empty(),
        "temp media must be removed even when publishing fails"
    );
}

#[tokio::test]
async fn download_failure_propagates_without_masking() {
    let dir = TempDir::new().unwrap();
    let mut orchestrator = RunOrchestrator::new(
        Box::new(StubDiscoverer {
            url: "https://i.pinimg.com/originals/a.jpg".to_string(),
        }),
        Box::new(WritingFetcher::new(b"", true)),
        Box::new(RecordingPublisher::new(false)),
        dir.path().to_path_buf(),
    );

    let err = orchestrator.run_once().await.unwrap_err();
    assert!(matches!(err, RunError::Download(DownloadError::Status(503))));
    assert!(temp_files(&dir).is_empty());
}

#[tokio::test]
async fn discovery_failure_skips_download_and_publish() {
    let dir = TempDir::new().unwrap();
    let fetcher = WritingFetcher::new(b"jpeg bytes", false);
    let fetched = Arc::clone(&fetcher.fetched);
    let publisher = RecordingPublisher::new(false);
    let saw_file = Arc::clone(&publisher.saw_file);
    let mut orchestrator = RunOrchestrator::new(
        Box::new(FailingDiscoverer),
        Box::new(fetcher),
        Box::new(publisher),
        dir.path().to_path_buf(),
    );

    let err = orchestrator.run_once().await.unwrap_err();
    assert!(matches!(err, RunError::Discovery(DiscoveryError::NoContent)));
    assert!(fetched.lock().unwrap().is_empty());
    assert!(saw_file.lock().unwrap().is_empty());
}
