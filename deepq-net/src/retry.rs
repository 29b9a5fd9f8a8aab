//! Bounded retry with exponential backoff
//!
//! Only transport-level transient failures are retried: rate limiting,
//! server errors and failed connections.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{is_certificate_error, NetError};

/// Retry schedule for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
    /// Ceiling for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Retries without waiting (tests)
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_connect() && !is_certificate_error(err)
    }
}

/// Send a request, retrying transient failures.
///
/// Non-retryable statuses are returned to the caller as-is. Running out of
/// retries on a retryable status yields [`NetError::MaxRetries`].
pub async fn send_with_retry(request: RequestBuilder, policy: &RetryPolicy) -> Result<Response, NetError> {
    let mut retry = 0;

    loop {
        // Streaming bodies can't be cloned; those get exactly one attempt
        let attempt = match request.try_clone() {
            Some(cloned) => cloned,
            None => return Ok(request.send().await?),
        };

        match attempt.send().await {
            Ok(response) if RetryPolicy::is_retryable_status(response.status()) => {
                let status = response.status();
                if retry >= policy.max_retries {
                    warn!("Giving up after {} retries, last status {}", retry, status);
                    return Err(NetError::MaxRetries(retry, status));
                }
                debug!("Transient status {}, retry {} of {}", status, retry + 1, policy.max_retries);
            }
            Ok(response) => return Ok(response),
            Err(e) if RetryPolicy::is_retryable_error(&e) && retry < policy.max_retries => {
                debug!("Connection failed ({}), retry {} of {}", e, retry + 1, policy.max_retries);
            }
            Err(e) => return Err(e.into()),
        }

        tokio::time::sleep(policy.delay_for(retry)).await;
        retry += 1;
    }
}
