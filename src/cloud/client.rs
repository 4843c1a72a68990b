//! reqwest-backed implementation of [`CloudApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cloud::types::{ErrorResponse, TestFinishedRequest};
use crate::cloud::{CloudApi, CloudError, CloudSample, CreateTestRunResponse, ReferenceId, TestRun};
use crate::core::threshold::ThresholdResult;

/// Default ingest endpoint, including the API version prefix.
pub const DEFAULT_HOST: &str = "https://ingest.skyrelay.io/v1";
/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the cloud client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Access token; requests go out unauthenticated when absent
    pub token: Option<String>,
    /// Base URL (default: https://ingest.skyrelay.io/v1)
    pub host: String,
    /// Sent as the `User-Agent` header
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            host: DEFAULT_HOST.to_string(),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// HTTP client for the cloud ingest service.
#[derive(Clone, Debug)]
pub struct Client {
    client: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Client {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.host.trim_end_matches('/'), path)
    }

    /// POSTs `body` as JSON, retrying transport failures and 5xx responses.
    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, CloudError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut attempt = 0;
        loop {
            match self.post_once(&url, body).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    log::debug!(
                        "Request to {} failed ({}), retry {}/{}",
                        url,
                        e,
                        attempt,
                        self.config.max_retries
                    );
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                result => return result,
            }
        }
    }

    async fn post_once<B>(&self, url: &str, body: &B) -> Result<reqwest::Response, CloudError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .post(url)
            .header("User-Agent", &self.config.user_agent)
            .json(body);
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CloudError::NotAuthorized);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
            Ok(body) => body.error.message,
            Err(_) => error_text,
        };
        Err(CloudError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, CloudError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl CloudApi for Client {
    async fn create_test_run(&self, run: &TestRun) -> Result<CreateTestRunResponse, CloudError> {
        self.post_json("tests", run).await
    }

    async fn push_metric(
        &self,
        reference_id: &ReferenceId,
        samples: &[CloudSample],
    ) -> Result<(), CloudError> {
        self.post(&format!("metrics/{}", reference_id), samples)
            .await
            .map(|_| ())
    }

    async fn test_finished(
        &self,
        reference_id: &ReferenceId,
        thresholds: &ThresholdResult,
        tainted: bool,
    ) -> Result<(), CloudError> {
        let body = TestFinishedRequest::new(thresholds, tainted);
        self.post(&format!("tests/{}", reference_id), &body)
            .await
            .map(|_| ())
    }
}
