//! Retry with exponential backoff for idempotent GET requests.

use std::future::Future;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use tracing::debug;

use crate::config::RetryConfig;
use crate::{AppError, AppResult};

/// Decides whether an attempt should be retried, given either the transport
/// error or the response status it produced.
pub type RetryPredicate = fn(Option<&reqwest::Error>, Option<StatusCode>) -> bool;

/// Retries on connect, timeout, request and body-read failures, any 5xx,
/// and 429.
pub fn default_retry_predicate(error: Option<&reqwest::Error>, status: Option<StatusCode>) -> bool {
    if let Some(status) = status {
        return is_retryable_status(status);
    }
    error.is_some_and(|e| {
        e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() || e.is_decode()
    })
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Final status and fully read body of a request.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub predicate: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.backoff_factor_ms),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            predicate: default_retry_predicate,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0 for the first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn delay_for(&self, retry: u32, response: Option<&Response>) -> Duration {
        response
            .and_then(|r| r.headers().get(RETRY_AFTER))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(self.max_backoff))
            .unwrap_or_else(|| self.backoff(retry))
    }

    /// Run `send` and read the response body until the exchange yields a
    /// non-retryable outcome or the attempt budget is spent.
    ///
    /// A failure while reading the body counts against the same budget as a
    /// failure to connect, so a download cut off part way is retried.
    ///
    /// `on_attempt` is told about every attempt (1-based). When the budget
    /// runs out on a retryable status, the last status and body are returned
    /// for the caller to interpret; when it runs out on a transport error the
    /// result is [`AppError::Network`].
    pub async fn execute<F, Fut, A>(
        &self,
        url: &str,
        mut send: F,
        mut on_attempt: A,
    ) -> AppResult<Fetched>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = reqwest::Result<Response>>,
        A: FnMut(u32),
    {
        let mut attempt = 1;
        loop {
            on_attempt(attempt);
            let exhausted = attempt >= self.max_attempts;

            let error = match send().await {
                Ok(response) => {
                    let status = response.status();
                    if !exhausted && (self.predicate)(None, Some(status)) {
                        let delay = self.delay_for(attempt - 1, Some(&response));
                        debug!(url = %url, attempt, status = %status, delay_ms = delay.as_millis() as u64, "Retrying request");
                        drop(response);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    match response.text().await {
                        Ok(body) => return Ok(Fetched { status, body }),
                        Err(error) => error,
                    }
                }
                Err(error) => error,
            };

            if exhausted || !(self.predicate)(Some(&error), None) {
                return Err(AppError::network(url, error));
            }
            let delay = self.backoff(attempt - 1);
            debug!(url = %url, attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_secs(3),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::OK));
        assert!(!default_retry_predicate(None, None));
    }

    #[test]
    fn test_zero_attempts_config_still_sends_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }
}
