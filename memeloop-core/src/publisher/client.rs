use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::PublisherSection;
use crate::session::SessionBlob;

use super::error::{PublishError, PublishResult};

/// The external publishing capability: authenticate, resume a persisted
/// session, upload a photo with a caption.
#[async_trait]
pub trait PublishClient: Send + Sync {
    async fn restore(&mut self, blob: &SessionBlob) -> PublishResult<()>;
    async fn login(&mut self, username: &str, password: &str) -> PublishResult<SessionBlob>;
    async fn upload_photo(&mut self, bytes: Vec<u8>, caption: &str) -> PublishResult<()>;
}

/// HTTP-backed publish client: form login yielding a JSON session payload,
/// bearer token for subsequent calls, multipart photo upload.
pub struct HttpPublishClient {
    http: Client,
    base_url: Url,
    login_path: String,
    upload_path: String,
    token: Option<String>,
}

impl HttpPublishClient {
    pub fn new(config: &PublisherSection) -> PublishResult<Self> {
        let http = Client::builder()
            .user_agent("memeloop/0.1")
            .timeout(Duration::from_secs(config.upload_timeout_seconds))
            .build()
            .map_err(|err| PublishError::Client(err.to_string()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| PublishError::Client(format!("invalid base url: {err}")))?;
        Ok(Self {
            http,
            base_url,
            login_path: config.login_path.clone(),
            upload_path: config.upload_path.clone(),
            token: None,
        })
    }

    fn endpoint(&self, path: &str) -> PublishResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| PublishError::Client(format!("invalid endpoint {path}: {err}")))
    }

    fn token_from(blob: &SessionBlob) -> Option<String> {
        blob.as_value()
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl PublishClient for HttpPublishClient {
    async fn restore(&mut self, blob: &SessionBlob) -> PublishResult<()> {
        let token = Self::token_from(blob)
            .ok_or_else(|| PublishError::Restore("session blob carries no token".to_string()))?;
        self.token = Some(token);
        debug!("publish session restored from stored blob");
        Ok(())
    }

    async fn login(&mut self, username: &str, password: &str) -> PublishResult<SessionBlob> {
        let endpoint = self.endpoint(&self.login_path)?;
        let response = self
            .http
            .post(endpoint)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|err| PublishError::Login(err.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|err| PublishError::Login(err.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| PublishError::Login(format!("malformed session payload: {err}")))?;

        let blob = SessionBlob::new(payload);
        let token = Self::token_from(&blob)
            .ok_or_else(|| PublishError::Login("login response carries no token".to_string()))?;
        self.token = Some(token);
        Ok(blob)
    }

    async fn upload_photo(&mut self, bytes: Vec<u8>, caption: &str) -> PublishResult<()> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| PublishError::Upload("not authenticated".to_string()))?
            .clone();
        let part = Part::bytes(bytes)
            .file_name("meme.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        let form = Form::new()
            .text("caption", caption.to_string())
            .part("file", part);

        let endpoint = self.endpoint(&self.upload_path)?;
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        response
            .error_for_status()
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        Ok(())
    }
}
