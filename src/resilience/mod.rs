//! Retry with exponential backoff and client-side rate limiting.
//!
//! [`ResilientTransport`] wraps any [`ChatTransport`](crate::transport::ChatTransport)
//! and is itself a transport, so the agent loop never knows whether it is
//! talking to the wire directly.

mod rate_limit;
mod retry;

pub use rate_limit::TokenBucket;
pub use retry::{is_retryable, ResilientTransport, RetryPolicy};
