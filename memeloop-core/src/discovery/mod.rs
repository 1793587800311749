mod error;
mod safety;
mod scraper;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::browser::BrowserLauncher;
use crate::config::{DiscoverySection, SafetySection};
use crate::run::DiscoverMedia;

pub use error::{DiscoveryError, DiscoveryResult};
pub use safety::SafetyFilter;
pub use scraper::{
    BrowserScrapeSession, BrowserScrapeSessionFactory, Candidate, DiscoveryStats, MemeScraper,
    ScrapeSession, ScrapeSessionFactory, SelectedMeme,
};

/// Full-lifecycle discoverer: launches a fresh Chromium instance per run,
/// scrapes, and tears the instance down on every exit path. A crashed or
/// wedged browser therefore never outlives the run that hit it.
pub struct BrowserDiscoverer {
    launcher: BrowserLauncher,
    config: Arc<DiscoverySection>,
    safety: SafetyFilter,
}

impl BrowserDiscoverer {
    pub fn new(launcher: BrowserLauncher, config: DiscoverySection, safety: &SafetySection) -> Self {
        Self {
            launcher,
            config: Arc::new(config),
            safety: SafetyFilter::new(safety),
        }
    }

    pub async fn discover_once(&self) -> DiscoveryResult<SelectedMeme> {
        let automation = Arc::new(self.launcher.launch().await?);
        let navigation_timeout = Duration::from_secs(self.config.navigation_timeout_seconds);
        let factory = BrowserScrapeSessionFactory::new(Arc::clone(&automation), navigation_timeout);
        let scraper = MemeScraper::new(
            Arc::clone(&self.config),
            self.safety.clone(),
            Arc::new(factory),
        );

        let result = scraper.discover().await;
        drop(scraper);
        match Arc::try_unwrap(automation) {
            Ok(automation) => {
                if let Err(err) = automation.shutdown().await {
                    warn!(error = %err, "browser shutdown failed after discovery");
                }
            }
            Err(_) => warn!("browser automation still referenced at teardown"),
        }
        result
    }
}

#[async_trait(?Send)]
impl DiscoverMedia for BrowserDiscoverer {
    async fn discover(&self) -> DiscoveryResult<SelectedMeme> {
        self.discover_once().await
    }
}
