//! Token-bucket rate limiting for external-API politeness.
//!
//! Refill is continuous (fractional accumulator), not discrete per tick.
//! A process-wide registry exposes named limiters so callers share a
//! budget per external API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Process-wide registry of named limiters.
static REGISTRY: Lazy<Mutex<HashMap<String, Arc<RateLimiter>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Get or create the shared limiter registered under `name`.
///
/// The first caller fixes the capacity and refill rate; later callers with
/// the same name share the budget regardless of the parameters they pass.
pub fn limiter(name: &str, capacity: f64, refill_per_sec: f64) -> Arc<RateLimiter> {
    let mut registry = REGISTRY.lock();
    Arc::clone(
        registry
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(capacity, refill_per_sec))),
    )
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket: `capacity` bounds the burst, `refill_per_sec` the
/// sustained rate.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter starting with a full bucket.
    #[must_use]
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(f64::MIN_POSITIVE),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consume one token if available. Never blocks, never over-consumes.
    pub fn allow(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block until a token is available or `token` fires.
    ///
    /// On cancellation returns `Cancelled` and consumes nothing; a token is
    /// never handed out after the cancellation handle has fired.
    pub async fn wait(&self, token: &CancellationToken) -> CoreResult<()> {
        loop {
            if token.is_cancelled() {
                return Err(CoreError::cancelled("RateLimiter.Wait"));
            }
            let deficit = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                1.0 - bucket.tokens
            };
            let next_token = Duration::from_secs_f64(deficit / self.refill_per_sec);
            tokio::select! {
                () = token.cancelled() => return Err(CoreError::cancelled("RateLimiter.Wait")),
                () = tokio::time::sleep(next_token) => {}
            }
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
    }
}
