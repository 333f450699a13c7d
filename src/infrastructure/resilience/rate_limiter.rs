//! Token-bucket rate limiter
//!
//! One bucket per provider: capacity `C` tokens, refilled at `R` tokens per
//! second based on elapsed time. Consumers that find the bucket empty suspend
//! until enough tokens would be available, bounded by a caller-supplied wait
//! budget. Refill math runs under the bucket lock, so concurrent consumers
//! never draw the level below zero and refills stay monotonic regardless of
//! interleaving.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Returned when tokens did not become available within the wait budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rate limit exceeded: {requested} token(s) not available within {waited_ms}ms")]
pub struct RateLimitExceeded {
    pub requested: u32,
    pub waited_ms: u64,
}

#[derive(Debug)]
struct BucketLevel {
    tokens: f64,
    last_refill: Instant,
}

impl BucketLevel {
    fn refill(&mut self, capacity: f64, refill_per_second: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket admission control for one provider
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    level: Mutex<BucketLevel>,
}

impl TokenBucket {
    /// A full bucket with the given capacity and refill rate
    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        Self {
            capacity,
            refill_per_second,
            level: Mutex::new(BucketLevel {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Deduct `tokens` if immediately available
    pub async fn try_consume(&self, tokens: u32) -> bool {
        let requested = f64::from(tokens);
        let mut level = self.level.lock().await;
        level.refill(self.capacity, self.refill_per_second);

        if level.tokens >= requested {
            level.tokens -= requested;
            true
        } else {
            false
        }
    }

    /// Deduct `tokens`, suspending until they are available
    ///
    /// Fails with [`RateLimitExceeded`] if the projected wait exceeds
    /// `max_wait`, or immediately if the request can never be satisfied.
    pub async fn consume(&self, tokens: u32, max_wait: Duration) -> Result<(), RateLimitExceeded> {
        let requested = f64::from(tokens);
        let start = Instant::now();

        if requested > self.capacity || self.refill_per_second <= 0.0 {
            return Err(RateLimitExceeded {
                requested: tokens,
                waited_ms: 0,
            });
        }

        loop {
            let shortfall = {
                let mut level = self.level.lock().await;
                level.refill(self.capacity, self.refill_per_second);

                if level.tokens >= requested {
                    level.tokens -= requested;
                    return Ok(());
                }

                requested - level.tokens
            };

            let wait = Duration::from_secs_f64(shortfall / self.refill_per_second);

            if start.elapsed() + wait > max_wait {
                return Err(RateLimitExceeded {
                    requested: tokens,
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }

            // Another consumer may win the tokens during the sleep; the loop
            // re-checks under the lock.
            sleep(wait).await;
        }
    }

    /// Currently available tokens, after an up-to-date refill
    pub async fn available(&self) -> f64 {
        let mut level = self.level.lock().await;
        level.refill(self.capacity, self.refill_per_second);
        level.tokens
    }
}
