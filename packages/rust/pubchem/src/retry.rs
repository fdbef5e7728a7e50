//! Per-request retry/backoff state machine.
//!
//! Each HTTP request gets its own attempt budget. Only rate limiting (429)
//! and service unavailable (503) are retried; everything else is decided on
//! the first response.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use crate::LookupError;

/// Attempts per request when nothing else is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff unit when nothing else is configured.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// Retry budget and backoff unit for a single HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after attempt `n` (1-based) is `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// What to do with a response received on a given attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 2xx: hand the response to the caller.
    Accept,
    /// Transient upstream condition: sleep, then try again.
    Retry(Duration),
    /// Terminal failure, no further attempts.
    Fail(LookupError),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Backoff delay after the 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Classify a status code received on the 1-based `attempt`.
    pub fn decide(&self, attempt: u32, status: StatusCode) -> Decision {
        if status.is_success() {
            return Decision::Accept;
        }

        match status {
            StatusCode::NOT_FOUND => Decision::Fail(LookupError::NotFound),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                Decision::Retry(self.delay_for(attempt))
            }
            other => Decision::Fail(LookupError::Status {
                code: other.as_u16(),
                reason: other.canonical_reason().unwrap_or("Unknown").to_string(),
            }),
        }
    }
}

/// Drive `send` until it yields an accepted response or the budget runs out.
///
/// The backoff sleep also follows the final retryable attempt, so a request
/// that never recovers waits `1 + 2 + ... + max_attempts` backoff units
/// before reporting [`LookupError::MaxRetriesExceeded`].
pub async fn send_with_retry<F, Fut>(policy: &RetryPolicy, mut send: F) -> Result<Response, LookupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    for attempt in 1..=policy.max_attempts {
        let response = send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let status = response.status();

        match policy.decide(attempt, status) {
            Decision::Accept => {
                debug!(attempt, %status, "request accepted");
                return Ok(response);
            }
            Decision::Retry(delay) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    %status,
                    delay_ms = delay.as_millis() as u64,
                    "upstream busy, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Decision::Fail(err) => {
                debug!(attempt, %status, error = %err, "request failed");
                return Err(err);
            }
        }
    }

    Err(LookupError::MaxRetriesExceeded)
}
