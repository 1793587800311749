use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};

/// Launches Chromium instances configured for unattended scraping on
/// constrained hosts: headless, sandbox off, dev-shm workarounds, a fixed
/// desktop user agent and a fixed viewport.
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<BrowserSection>,
}

impl BrowserLauncher {
    pub fn new(config: BrowserSection) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BrowserSection {
        &self.config
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        let chromium_config = self.build_chromium_config()?;
        let user_agent = self.config.user_agent.desktop.clone();
        info!(
            ua = %user_agent,
            width = self.config.viewport.width,
            height = self.config.viewport.height,
            headless = self.config.chromium.headless,
            "Launching Chromium instance"
        );

        let launch_timeout = Duration::from_secs(self.config.chromium.launch_timeout_seconds);
        let (browser, mut handler) =
            match tokio::time::timeout(launch_timeout, Browser::launch(chromium_config)).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(err)) => return Err(BrowserError::Launch(err.to_string())),
                Err(_) => {
                    return Err(BrowserError::Launch(format!(
                        "launch timed out after {}s",
                        launch_timeout.as_secs()
                    )))
                }
            };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(BrowserAutomation {
            browser,
            handler_task: Some(handler_task),
            user_agent,
        })
    }

    fn build_chromium_config(&self) -> BrowserResult<ChromiumConfig> {
        let viewport = &self.config.viewport;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width: viewport.width,
            height: viewport.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: viewport.width >= viewport.height,
            has_touch: false,
        });

        if let Some(executable) = &self.config.chromium.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !self.config.chromium.headless {
            builder = builder.with_head();
        }
        if !self.config.chromium.sandbox {
            builder = builder.no_sandbox();
        }

        let flags = &self.config.flags;
        let mut args = vec![
            format!("--user-agent={}", self.config.user_agent.desktop),
            format!("--window-size={},{}", viewport.width, viewport.height),
        ];
        if !self.config.chromium.sandbox {
            args.push("--disable-setuid-sandbox".into());
        }
        if flags.disable_dev_shm_usage {
            args.push("--disable-dev-shm-usage".into());
        }
        if flags.single_process {
            args.push("--single-process".into());
        }
        if flags.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if flags.mute_audio {
            args.push("--mute-audio".into());
        }
        if flags.no_first_run {
            args.push("--no-first-run".into());
        }
        if flags.disable_automation_controlled {
            args.push("--disable-features=AutomationControlled".into());
        }
        args.extend(flags.extra_args.iter().cloned());

        builder = builder.args(args);
        builder.build().map_err(BrowserError::Configuration)
    }
}

/// A running Chromium process. Owns the CDP handler task; callers must
/// invoke [`BrowserAutomation::shutdown`] on every exit path or the
/// rendering process leaks.
#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    user_agent: String,
}

impl BrowserAutomation {
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn new_context(&self) -> BrowserResult<SurfaceContext> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        self.configure_page(&page).await?;
        Ok(SurfaceContext {
            page,
            user_agent: self.user_agent.clone(),
        })
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("Shutting down Chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        Ok(())
    }

    async fn configure_page(&self, page: &Page) -> BrowserResult<()> {
        page.enable_stealth_mode_with_agent(&self.user_agent)
            .await?;

        let params = SetUserAgentOverrideParams::builder()
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(BrowserError::Configuration)?;
        page.set_user_agent(params).await?;

        self.install_request_filter(page).await?;
        Ok(())
    }

    /// Abort image/stylesheet/font sub-resource requests. Extraction reads
    /// `src` attributes, not rendered pixels, so the blocked bytes are pure
    /// bandwidth and memory overhead.
    async fn install_request_filter(&self, page: &Page) -> BrowserResult<()> {
        page.execute(FetchEnableParams::builder().build()).await?;
        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let dispatcher = page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let abort = matches!(
                    event.resource_type,
                    ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font
                );
                let outcome = if abort {
                    dispatcher
                        .execute(FailRequestParams::new(request_id, ErrorReason::Aborted))
                        .await
                        .map(|_| ())
                } else {
                    dispatcher
                        .execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ())
                };
                if let Err(err) = outcome {
                    debug!(error = %err, "request filter dispatch failed");
                }
            }
        });
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("BrowserAutomation dropped without explicit shutdown");
            }
        }
    }
}

/// One configured page inside a running browser.
#[derive(Debug)]
pub struct SurfaceContext {
    page: Page,
    user_agent: String,
}

impl SurfaceContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Navigate with a hard deadline. Timeouts and network failures both
    /// surface as [`BrowserError::Navigation`] so the discoverer can move on
    /// to the next query target.
    pub async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    pub async fn evaluate<T>(&self, script: &str) -> BrowserResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to decode script payload: {err}"))
            })
    }
}
