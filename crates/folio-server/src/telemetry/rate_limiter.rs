// SPDX-License-Identifier: Apache-2.0

use crate::telemetry::redis_backend::RedisBackend;
use crate::RateLimitConfig;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refilled(&self, now: Instant, cfg: &RateLimitConfig) -> f64 {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * cfg.refill_per_sec).min(cfg.capacity)
    }
}

/// Token buckets keyed by client. A configured Redis backend takes
/// precedence; local buckets answer whenever Redis errors.
pub(crate) struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    redis: Option<RedisBackend>,
    scope: String,
    max_tracked: usize,
}

impl RateLimiter {
    pub(crate) fn new(redis: Option<RedisBackend>, scope: &str, max_tracked: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            redis,
            scope: scope.to_string(),
            max_tracked: max_tracked.max(1),
        }
    }

    pub(crate) fn redis_fallbacks(&self) -> u64 {
        self.redis.as_ref().map_or(0, RedisBackend::fallbacks)
    }

    pub(crate) async fn allow(&self, key: &str, cfg: &RateLimitConfig) -> bool {
        if let Some(redis) = &self.redis {
            match redis.rate_limit_allow(&self.scope, key, cfg).await {
                Ok(v) => return v,
                Err(e) => {
                    tracing::warn!(scope = %self.scope, "redis rate-limit fallback: {e}");
                }
            }
        }
        let now = Instant::now();
        let mut lock = self.buckets.lock().await;
        if lock.len() >= self.max_tracked && !lock.contains_key(key) {
            // A full bucket behaves exactly like a missing one.
            lock.retain(|_, b| b.refilled(now, cfg) < cfg.capacity);
        }
        let bucket = lock.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: cfg.capacity,
            last_refill: now,
        });
        bucket.tokens = bucket.refilled(now, cfg);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
