use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memeloop_core::{
    load_memeloop_config, BrowserDiscoverer, BrowserLauncher, CaptionTemplate, HttpPublishClient,
    MediaDownloader, MemeloopConfig, Publisher, RunOrchestrator, Scheduler, SessionStore,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] memeloop_core::ConfigError),
    #[error("publisher error: {0}")]
    Publish(#[from] memeloop_core::PublishError),
    #[error("download error: {0}")]
    Download(#[from] memeloop_core::DownloadError),
}

const CONFIG_ENV: &str = "MEMELOOP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "configs/memeloop.toml";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The daemon takes no arguments: configuration comes from
/// `MEMELOOP_CONFIG` (or the default path), with built-in defaults when no
/// file exists at all.
pub fn load_config() -> Result<MemeloopConfig> {
    let path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    if path.exists() {
        info!(path = %path.display(), "loading configuration");
        Ok(load_memeloop_config(&path)?)
    } else {
        warn!(path = %path.display(), "no config file found, using built-in defaults");
        Ok(MemeloopConfig::default())
    }
}

pub async fn run() -> Result<()> {
    let config = load_config()?;
    info!(
        targets = config.discovery.query_targets.len(),
        selectors = config.discovery.selector_strategies.len(),
        session = %config.session_path().display(),
        "memeloop starting"
    );

    let launcher = BrowserLauncher::new(config.browser.clone());
    let discoverer =
        BrowserDiscoverer::new(launcher, config.discovery.clone(), &config.safety);
    let downloader = MediaDownloader::new(&config.download)?;
    let store = SessionStore::new(config.session_path());
    let client = HttpPublishClient::new(&config.publisher)?;
    let caption = CaptionTemplate::new(&config.publisher.caption);
    let publisher = Publisher::new(Box::new(client), store, caption, config.publisher.clone());

    let orchestrator = RunOrchestrator::new(
        Box::new(discoverer),
        Box::new(downloader),
        Box::new(publisher),
        config.work_dir(),
    );
    let mut scheduler = Scheduler::new(Box::new(orchestrator), config.scheduler.clone());
    scheduler.run_forever().await;
    Ok(())
}
