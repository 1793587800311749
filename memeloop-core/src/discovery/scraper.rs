use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserAutomation, BrowserError, BrowserResult, SurfaceContext};
use crate::config::DiscoverySection;

use super::error::{DiscoveryError, DiscoveryResult};
use super::safety::SafetyFilter;

/// A media URL pulled out of a rendered page, before the safety filter.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub query_target: String,
    pub selector: String,
}

/// The one candidate chosen for a run. Guaranteed to have passed the
/// safety filter.
#[derive(Debug, Clone)]
pub struct SelectedMeme {
    pub url: String,
    pub query_target: String,
    pub selector: String,
}

impl From<Candidate> for SelectedMeme {
    fn from(candidate: Candidate) -> Self {
        Self {
            url: candidate.url,
            query_target: candidate.query_target,
            selector: candidate.selector,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DiscoveryStats {
    pub targets_tried: usize,
    pub candidates_found: usize,
    pub safe_candidates: usize,
    pub rejected: usize,
    pub duration_secs: u64,
}

#[async_trait(?Send)]
pub trait ScrapeSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;
    async fn settle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()>;
    async fn scroll(&mut self, delta_y: f64) -> BrowserResult<()>;
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()>;
    async fn image_sources(&mut self, selector: &str) -> BrowserResult<Vec<String>>;
}

#[async_trait(?Send)]
pub trait ScrapeSessionFactory: Send + Sync {
    async fn create(&self) -> BrowserResult<Box<dyn ScrapeSession>>;
}

pub struct BrowserScrapeSessionFactory {
    automation: Arc<BrowserAutomation>,
    navigation_timeout: Duration,
}

impl BrowserScrapeSessionFactory {
    pub fn new(automation: Arc<BrowserAutomation>, navigation_timeout: Duration) -> Self {
        Self {
            automation,
            navigation_timeout,
        }
    }
}

#[async_trait(?Send)]
impl ScrapeSessionFactory for BrowserScrapeSessionFactory {
    async fn create(&self) -> BrowserResult<Box<dyn ScrapeSession>> {
        let context = self.automation.new_context().await?;
        Ok(Box::new(BrowserScrapeSession {
            context,
            navigation_timeout: self.navigation_timeout,
        }))
    }
}

pub struct BrowserScrapeSession {
    context: SurfaceContext,
    navigation_timeout: Duration,
}

impl BrowserScrapeSession {
    fn quote(selector: &str) -> String {
        Value::String(selector.to_string()).to_string()
    }
}

#[async_trait(?Send)]
impl ScrapeSession for BrowserScrapeSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.context.goto(url, self.navigation_timeout).await
    }

    async fn settle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()> {
        if range_ms.0 == 0 && range_ms.1 == 0 {
            return Ok(());
        }
        let lower = range_ms.0.min(range_ms.1);
        let upper = range_ms.0.max(range_ms.1);
        let millis = rand::thread_rng().gen_range(lower..=upper);
        sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn scroll(&mut self, delta_y: f64) -> BrowserResult<()> {
        let script = format!("window.scrollBy(0, {delta_y});");
        self.context
            .page()
            .evaluate(script.as_str())
            .await
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to execute scroll script: {err}"))
            })?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let script = format!(
            "document.querySelector({}) !== null",
            Self::quote(selector)
        );
        let deadline = Instant::now() + timeout;
        loop {
            let present: bool = self.context.evaluate(&script).await?;
            if present {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("selector {selector}")));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    async fn image_sources(&mut self, selector: &str) -> BrowserResult<Vec<String>> {
        let script = format!(
            r#"
(() => {{
    const selector = {selector};
    return Array.from(document.querySelectorAll(selector))
        .map((img) => img.currentSrc || img.src || '')
        .filter((src) => src.length > 0);
}})()
"#,
            selector = Self::quote(selector)
        );
        self.context.evaluate(&script).await
    }
}

/// Drives a scrape session through the ordered query targets and selector
/// strategies until enough image candidates accumulate, then applies the
/// safety filter and selects uniformly at random.
pub struct MemeScraper {
    config: Arc<DiscoverySection>,
    safety: SafetyFilter,
    sessions: Arc<dyn ScrapeSessionFactory>,
}

impl MemeScraper {
    pub fn new(
        config: Arc<DiscoverySection>,
        safety: SafetyFilter,
        sessions: Arc<dyn ScrapeSessionFactory>,
    ) -> Self {
        Self {
            config,
            safety,
            sessions,
        }
    }

    pub fn config(&self) -> &DiscoverySection {
        &self.config
    }

    pub async fn discover(&self) -> DiscoveryResult<SelectedMeme> {
        let start = Instant::now();
        let mut stats = DiscoveryStats::default();
        let mut session = self.sessions.create().await.map_err(DiscoveryError::from)?;

        let mut candidates: Vec<Candidate> = Vec::new();
        for target in &self.config.query_targets {
            stats.targets_tried += 1;
            if let Err(err) = self
                .scan_target(session.as_mut(), target, &mut candidates)
                .await
            {
                warn!(target = %target, error = %err, "query target failed, trying next");
                continue;
            }
            if !candidates.is_empty() {
                break;
            }
        }

        if candidates.is_empty() {
            return Err(DiscoveryError::NoContent);
        }
        stats.candidates_found = candidates.len();

        let safe: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| self.safety.is_safe(&candidate.url))
            .collect();
        stats.safe_candidates = safe.len();
        stats.rejected = stats.candidates_found - stats.safe_candidates;
        stats.duration_secs = start.elapsed().as_secs();

        if safe.is_empty() {
            return Err(DiscoveryError::NoSafeContent {
                rejected: stats.rejected,
            });
        }

        let selected = safe
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(DiscoveryError::NoContent)?;
        info!(
            url = %selected.url,
            target = %selected.query_target,
            selector = %selected.selector,
            targets_tried = stats.targets_tried,
            candidates = stats.candidates_found,
            safe = stats.safe_candidates,
            rejected = stats.rejected,
            duration = stats.duration_secs,
            "discovery selected a meme"
        );
        Ok(selected.into())
    }

    /// One query target: navigate, let dynamic content settle, scroll to
    /// trigger lazy loading, then run the selector strategies in order.
    /// Any failure here moves discovery on to the next target.
    async fn scan_target(
        &self,
        session: &mut dyn ScrapeSession,
        target: &str,
        candidates: &mut Vec<Candidate>,
    ) -> BrowserResult<()> {
        session.goto(target).await?;
        session
            .settle((self.config.settle_range_ms[0], self.config.settle_range_ms[1]))
            .await?;

        for _ in 0..self.config.scroll_steps {
            session.scroll(self.config.scroll_delta_px).await?;
            session
                .settle((self.config.scroll_pause_ms, self.config.scroll_pause_ms))
                .await?;
        }

        let selector_wait = Duration::from_millis(self.config.selector_wait_ms);
        for selector in &self.config.selector_strategies {
            // A selector that never matches is an expected outcome, not a
            // discovery failure.
            match self
                .collect_with_selector(session, selector, selector_wait)
                .await
            {
                Ok(sources) => {
                    for url in sources {
                        if self.safety.is_image_url(&url) {
                            candidates.push(Candidate {
                                url,
                                query_target: target.to_string(),
                                selector: selector.clone(),
                            });
                        }
                    }
                }
                Err(err) => {
                    debug!(selector = %selector, error = %err, "selector strategy yielded nothing");
                }
            }
            if candidates.len() > self.config.enough_candidates {
                break;
            }
        }
        Ok(())
    }

    async fn collect_with_selector(
        &self,
        session: &mut dyn ScrapeSession,
        selector: &str,
        wait: Duration,
    ) -> BrowserResult<Vec<String>> {
        session.wait_for(selector, wait).await?;
        session.image_sources(selector).await
    }
}
