use super::TokenBucket;
use crate::transport::{ChatTransport, Completion, Message, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_wait: Duration,
    pub max_wait: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: `min(initial * multiplier^attempt, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial_wait.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_wait.as_secs_f64() {
            return self.max_wait;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Whether a failed call is worth repeating.
///
/// Rate limits, gateway/server failures, timeouts and refused connections are
/// transient. Client errors, broken streams and cancellation are not.
pub fn is_retryable(err: &TransportError) -> bool {
    match err {
        TransportError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
        TransportError::Network {
            timeout, connect, ..
        } => *timeout || *connect,
        TransportError::StreamParse(_) | TransportError::Cancelled => false,
    }
}

/// A transport that rate-limits and retries another transport.
pub struct ResilientTransport<T> {
    inner: T,
    policy: RetryPolicy,
    bucket: TokenBucket,
}

impl<T: ChatTransport> ResilientTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy, bucket: TokenBucket) -> Self {
        Self {
            inner,
            policy,
            bucket,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for ResilientTransport<T> {
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Completion, TransportError> {
        // One token per logical call; retries ride on it.
        self.bucket.acquire(cancel).await?;

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            match self.inner.complete(messages, cancel).await {
                Ok(completion) => {
                    if attempt > 0 {
                        debug!("Request succeeded after {} retries", attempt);
                    }
                    return Ok(completion);
                }
                Err(err) if attempt < self.policy.max_retries && is_retryable(&err) => {
                    let wait = self.policy.backoff(attempt);
                    warn!(
                        "Retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.policy.max_retries + 1,
                        wait,
                        err
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
