use log::debug;
use std::fmt;
use std::time::Duration;

use super::constants::USER_AGENT;
use super::resilience::{Classify, RetryPolicy, RetryableError};
use crate::error::{Error, Result};

/// A failed HTTP exchange, classified for the retry policy.
#[derive(Debug)]
pub struct HttpFailure {
    kind: RetryableError,
    message: String,
}

impl HttpFailure {
    fn status(status: u16, body: String) -> Self {
        Self {
            kind: RetryableError::from_status_code(status),
            message: format!("HTTP {}: {}", status, body.trim()),
        }
    }
}

impl From<reqwest::Error> for HttpFailure {
    fn from(error: reqwest::Error) -> Self {
        Self {
            kind: RetryableError::from_reqwest_error(&error),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Classify for HttpFailure {
    fn classify(&self) -> RetryableError {
        self.kind.clone()
    }
}

/// Authorized HTTP client shared by the Sheets and Drive stores.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    access_token: String,
    retry: RetryPolicy,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, access_token: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            access_token,
            retry,
        }
    }

    pub fn build_http() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
    }

    /// Send the request produced by `build`, retrying transient failures.
    /// Non-success statuses are failures; the body is kept in the message.
    pub async fn send<F>(&self, operation: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let http = &self.http;
        let token = self.access_token.as_str();
        let build = &build;

        let response = self
            .retry
            .execute(operation, || async move {
                let response = match build(http).bearer_auth(token).send().await {
                    Ok(response) => response,
                    Err(e) => return Err(HttpFailure::from(e)),
                };
                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    let body = response.text().await.unwrap_or_default();
                    Err(HttpFailure::status(status.as_u16(), body))
                }
            })
            .await
            .map_err(|e| Error::remote(operation, e))?;

        debug!("{}: {}", operation, response.status());
        Ok(response)
    }

    pub async fn send_json<F>(&self, operation: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send(operation, build)
            .await?
            .json()
            .await
            .map_err(|e| Error::remote(operation, e))
    }
}
