//! Token-bucket rate limiting, exposed as the `rate_limit` route middleware.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::schema::RateLimitConfig;
use crate::http::error::HttpError;
use crate::http::handler::HandlerFuture;
use crate::http::middleware::{Middleware, Next};
use crate::http::request::RequestContext;
use crate::observability::metrics;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Buckets {
    by_client: HashMap<String, TokenBucket>,
    last_sweep: Instant,
}

/// Per-client limiter keyed on user id, else client IP.
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    rps: f64,
    burst: f64,
    limit: u32,
    /// A bucket idle this long has refilled and equals a fresh one.
    idle_after: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rps = config.requests_per_second as f64;
        let burst = config.burst_size as f64;
        let refill_secs = if rps > 0.0 { burst / rps } else { 0.0 };
        Self {
            buckets: Mutex::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            rps,
            burst,
            limit: config.requests_per_second,
            idle_after: Duration::from_secs_f64(refill_secs.max(1.0)),
        }
    }

    /// Take one token for `key`. Idle buckets are swept once per interval.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if now.duration_since(buckets.last_sweep) >= SWEEP_INTERVAL {
            self.sweep(&mut buckets, now);
        }
        let bucket = buckets
            .by_client
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rps)
    }

    fn sweep(&self, buckets: &mut Buckets, now: Instant) {
        let before = buckets.by_client.len();
        buckets
            .by_client
            .retain(|_, b| now.duration_since(b.last_update) < self.idle_after);
        buckets.last_sweep = now;
        tracing::debug!(removed = before - buckets.by_client.len(), "Swept idle rate limit buckets");
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|p| p.into_inner()).by_client.len()
    }

    fn retry_after_secs(&self) -> u64 {
        if self.rps <= 0.0 {
            return 1;
        }
        (1.0 / self.rps).ceil().max(1.0) as u64
    }
}

impl Middleware for RateLimiter {
    fn handle(&self, ctx: RequestContext, next: Next) -> HandlerFuture {
        let key = ctx.client_key();
        if self.check(&key) {
            return next.run(ctx);
        }

        tracing::warn!(client = %key, path = %ctx.path, "Rate limit exceeded");
        metrics::record_rate_limited();
        let error = HttpError::TooManyRequests {
            message: "Too Many Requests".to_string(),
            limit: self.limit,
            retry_after_secs: self.retry_after_secs(),
        };
        Box::pin(async move { Err(error) })
    }
}
