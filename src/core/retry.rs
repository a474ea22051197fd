use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::core::error::ReportError;

/// Outcome of a single failed network call.
#[derive(Debug)]
pub enum CallError {
    /// Network fault, timeout, rate limit or server error. Eligible for retry.
    Transient(String),
    /// Anything else. Returned to the caller immediately.
    Fatal(ReportError),
}

impl CallError {
    /// Classify an HTTP status that is not a success.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let msg = format!("HTTP {}: {}", status.as_u16(), body.trim());
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(msg)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Self::Fatal(ReportError::Authentication(msg))
        } else {
            Self::Fatal(ReportError::Fetch {
                page: 0,
                offset: 0,
                reason: msg,
            })
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Fatal(ReportError::Fetch {
                page: 0,
                offset: 0,
                reason: format!("malformed response: {}", err),
            });
        }
        let kind = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::Transient(format!("{}: {}", kind, err))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Run `op` until it succeeds, fails fatally, or `policy.max_attempts`
/// transient failures have happened. The last transient error is returned
/// when the budget runs out.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(CallError::Transient(reason)) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "{} failed: {}; retrying",
                    what,
                    reason
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
