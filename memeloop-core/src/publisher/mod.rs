mod caption;
mod client;
mod error;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PublisherSection;
use crate::session::SessionStore;

pub use caption::CaptionTemplate;
pub use client::{HttpPublishClient, PublishClient};
pub use error::{PublishError, PublishResult};

/// Account credentials, read from the process environment at login time.
/// Absence fails fast instead of silently proceeding.
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn from_env(username_var: &str, password_var: &str) -> PublishResult<Self> {
        let username = std::env::var(username_var)
            .map_err(|_| PublishError::MissingCredentials(username_var.to_string()))?;
        let password = std::env::var(password_var)
            .map_err(|_| PublishError::MissingCredentials(password_var.to_string()))?;
        Ok(Self { username, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Publishes one local media file per invocation, resuming the persisted
/// session when one exists and logging in fresh otherwise.
///
/// Any failure — restore, login, read, or upload — invalidates the stored
/// session before the error propagates: a blob implicated in a failure is
/// never kept.
pub struct Publisher {
    client: Box<dyn PublishClient>,
    store: SessionStore,
    caption: CaptionTemplate,
    config: Arc<PublisherSection>,
}

impl Publisher {
    pub fn new(
        client: Box<dyn PublishClient>,
        store: SessionStore,
        caption: CaptionTemplate,
        config: PublisherSection,
    ) -> Self {
        Self {
            client,
            store,
            caption,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn publish(&mut self, media: &Path) -> PublishResult<()> {
        let result = self.publish_inner(media).await;
        if let Err(err) = &result {
            warn!(error = %err, "publish failed, invalidating stored session");
            if let Err(cleanup) = self.store.invalidate() {
                warn!(error = %cleanup, "session invalidation itself failed");
            }
        }
        result
    }

    async fn publish_inner(&mut self, media: &Path) -> PublishResult<()> {
        match self.store.load()? {
            Some(blob) => {
                self.client.restore(&blob).await?;
                info!("restored publishing session");
            }
            None => {
                let credentials =
                    Credentials::from_env(&self.config.username_env, &self.config.password_env)?;
                info!(username = %credentials.username, "no stored session, logging in");
                let mut blob = self
                    .client
                    .login(&credentials.username, credentials.password())
                    .await?;
                blob.strip(&self.config.strip_fields);
                self.store.save(&blob)?;
                info!("saved fresh publishing session");
            }
        }

        let bytes = tokio::fs::read(media)
            .await
            .map_err(|source| PublishError::Io {
                source,
                path: media.to_path_buf(),
            })?;
        let caption = self.caption.render();
        self.client.upload_photo(bytes, &caption).await?;
        info!(path = %media.display(), "upload complete");
        Ok(())
    }
}
