//! Backoff for row store and object store calls.
//!
//! Network drops, throttling and 5xx answers from the Google APIs are
//! retried; everything else fails on the first attempt.

use log::{debug, info, warn};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total tries, the first one included.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Spread each wait over 50%..150% of its nominal value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Why a remote call failed, as far as retrying is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryableError {
    Network,
    Timeout,
    /// 429, Sheets' per-minute quota.
    RateLimited,
    Server(u16),
    Client(u16),
    /// 401 and 403; a new token is needed, not another attempt.
    Unauthorized,
    Other,
}

impl RetryableError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RetryableError::Network
                | RetryableError::Timeout
                | RetryableError::RateLimited
                | RetryableError::Server(_)
        )
    }

    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 | 403 => RetryableError::Unauthorized,
            408 => RetryableError::Timeout,
            429 => RetryableError::RateLimited,
            500..=599 => RetryableError::Server(status),
            400..=499 => RetryableError::Client(status),
            _ => RetryableError::Other,
        }
    }

    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        match error.status() {
            _ if error.is_timeout() => RetryableError::Timeout,
            _ if error.is_connect() || error.is_request() => RetryableError::Network,
            Some(status) => Self::from_status_code(status.as_u16()),
            None => RetryableError::Other,
        }
    }
}

/// Errors that know whether they are worth another attempt.
pub trait Classify {
    fn classify(&self) -> RetryableError;
}

impl Classify for reqwest::Error {
    fn classify(&self) -> RetryableError {
        RetryableError::from_reqwest_error(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Await `operation` until it succeeds, fails for good or the attempts
    /// are used up. The last error is returned as is.
    pub async fn execute<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("{}: attempt {} of {}", name, attempt, attempts);
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{}: recovered on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = error.classify();
            if !kind.is_transient() || attempt >= attempts {
                warn!("{}: giving up after attempt {} ({:?}): {}", name, attempt, kind, error);
                return Err(error);
            }

            let wait = self.delay_before(attempt + 1);
            warn!("{}: {:?} on attempt {}, retrying in {:?}: {}", name, kind, attempt, wait, error);
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Wait inserted before try number `attempt` (2 is the first retry).
    fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(64) as i32;
        let mut secs = (self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(exponent))
            .min(self.config.max_delay.as_secs_f64());
        if self.config.jitter {
            secs *= rand::thread_rng().gen_range(0.5..=1.5);
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}
