use crate::types::{BatchConfig, BatchTestError, Result};
use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Rate limiting and server-side failures, except the two 5xx codes that
/// will never succeed on a second try.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error()
            && status != StatusCode::NOT_IMPLEMENTED
            && status != StatusCode::HTTP_VERSION_NOT_SUPPORTED)
}

/// Parses a `Retry-After` value given as whole seconds or as an HTTP-date.
/// A date in the past yields a negative delay.
pub fn parse_retry_after(value: &str) -> Option<chrono::Duration> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<i64>().ok().and_then(chrono::Duration::try_seconds);
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc) - Utc::now())
}

/// Delay to wait before retrying, clamped at zero.
pub fn retry_after_delay(retry_after: Option<&str>, default_delay: Duration) -> Duration {
    let Some(value) = retry_after else {
        return default_delay;
    };

    match parse_retry_after(value) {
        Some(delay) => delay.to_std().unwrap_or(Duration::ZERO),
        None => {
            warn!("Ignoring unparsable Retry-After value '{}'", value);
            default_delay
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_delay: Duration::from_secs(2),
        }
    }
}

impl From<&BatchConfig> for RetryPolicy {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            default_delay: config.transient_delay,
        }
    }
}

/// Back-off that waits whatever the server asked for, or a fixed default,
/// until the attempt budget runs out.
struct RetryAfterBackoff {
    default_delay: Duration,
    max_retries: u32,
    retries: u32,
    retry_after: Option<Duration>,
}

impl RetryAfterBackoff {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            default_delay: policy.default_delay,
            max_retries: policy.max_attempts.saturating_sub(1),
            retries: 0,
            retry_after: None,
        }
    }

    fn observe(&mut self, error: &BatchTestError) {
        self.retry_after = error
            .retry_after()
            .map(|value| retry_after_delay(Some(value), self.default_delay));
    }
}

impl Backoff for RetryAfterBackoff {
    fn reset(&mut self) {
        self.retries = 0;
        self.retry_after = None;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.retry_after.take().unwrap_or(self.default_delay))
    }
}

/// Runs `operation`, retrying transient failures per `policy`.
///
/// Non-transient errors and the last transient error are returned as-is.
/// Once `cancellation` fires, no further attempt is made and
/// [`BatchTestError::Cancelled`] is returned, including when it has already
/// fired before the first attempt.
pub async fn on_transient_error<T, F, Fut>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = RetryAfterBackoff::new(policy);

    loop {
        if cancellation.is_cancelled() {
            return Err(BatchTestError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(BatchTestError::Cancelled),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() => error,
            Err(error) => return Err(error),
        };

        backoff.observe(&error);
        let Some(delay) = backoff.next_backoff() else {
            debug!("Retry budget of {} attempts exhausted", policy.max_attempts);
            return Err(error);
        };

        warn!("Transient failure ({}), retrying in {:?}", error, delay);
        sleep_or_cancel(delay, cancellation).await?;
    }
}

/// Sleeps for `delay` unless `cancellation` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancellation: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(BatchTestError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
