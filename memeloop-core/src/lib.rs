pub mod browser;
pub mod config;
pub mod discovery;
pub mod download;
pub mod error;
pub mod publisher;
pub mod run;
pub mod scheduler;
pub mod session;

pub use browser::{BrowserAutomation, BrowserError, BrowserLauncher, BrowserResult, SurfaceContext};
pub use config::{load_memeloop_config, MemeloopConfig};
pub use discovery::{
    BrowserDiscoverer, Candidate, DiscoveryError, DiscoveryResult, DiscoveryStats, MemeScraper,
    SafetyFilter, ScrapeSession, ScrapeSessionFactory, SelectedMeme,
};
pub use download::{DownloadError, DownloadResult, MediaDownloader};
pub use error::{ConfigError, Result};
pub use publisher::{
    CaptionTemplate, Credentials, HttpPublishClient, PublishClient, PublishError, PublishResult,
    Publisher,
};
pub use run::{DiscoverMedia, FetchMedia, PublishMedia, RunError, RunOrchestrator, RunReport, RunResult};
pub use scheduler::{RunPipeline, Scheduler, SchedulerPhase, SchedulerState};
pub use session::{SessionBlob, SessionError, SessionResult, SessionStore};
