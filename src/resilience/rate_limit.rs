use crate::transport::TransportError;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Slowest refill accepted: one token per hour.
const MIN_REFILL_PER_SEC: f64 = 1.0 / 3600.0;

/// Token bucket limiting requests per provider.
///
/// Starts full. Refills continuously at `refill_per_sec`, never above
/// `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(MIN_REFILL_PER_SEC),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket for `rpm` requests per minute: refill `rpm/60` per second, burst `2 * rpm`.
    pub fn per_minute(rpm: u32) -> Self {
        let rpm = f64::from(rpm.max(1));
        Self::new(rpm * 2.0, rpm / 60.0)
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state);
        state.tokens
    }

    /// Take one token, waiting for the refill if the bucket is empty.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            debug!("Rate limited, waiting {:?}", wait);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}
