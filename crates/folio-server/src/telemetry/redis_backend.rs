// SPDX-License-Identifier: Apache-2.0

use crate::RateLimitConfig;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::time::timeout;

/// Window counters expire one second after their window closes.
const WINDOW_TTL_SECS: i64 = 2;

#[derive(Clone, Debug)]
pub(crate) struct RedisPolicy {
    pub timeout: Duration,
    pub retry_attempts: usize,
    pub breaker_failure_threshold: u32,
    pub breaker_open_duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SharedLimitError {
    #[error("shared rate limit circuit is open")]
    CircuitOpen,
    #[error("shared rate limit call exceeded {0:?}")]
    TimedOut(Duration),
    #[error("shared rate limit call failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("system clock is before the unix epoch")]
    Clock,
}

/// Consecutive failures since the last good call; past the threshold the
/// circuit stays open until `open_until`.
#[derive(Debug, Default)]
struct Circuit {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct SharedLimitCounters {
    fallbacks: AtomicU64,
    circuit_opened: AtomicU64,
    circuit_rejected: AtomicU64,
}

/// Per-client request counts shared across replicas through one Redis key
/// per client per second. Callers treat any error as "ask the local bucket".
#[derive(Clone)]
pub(crate) struct RedisBackend {
    client: redis::Client,
    prefix: String,
    policy: RedisPolicy,
    circuit: Arc<Mutex<Circuit>>,
    counters: Arc<SharedLimitCounters>,
}

impl RedisBackend {
    pub(crate) fn new(
        url: &str,
        prefix: &str,
        policy: RedisPolicy,
    ) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            prefix: prefix.to_string(),
            policy,
            circuit: Arc::new(Mutex::new(Circuit::default())),
            counters: Arc::new(SharedLimitCounters::default()),
        })
    }

    /// Requests answered by the local buckets because the shared count failed.
    pub(crate) fn fallbacks(&self) -> u64 {
        self.counters.fallbacks.load(Ordering::Relaxed)
    }

    fn circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, now: Instant) -> Result<(), SharedLimitError> {
        match self.circuit().open_until {
            Some(until) if now < until => {
                self.counters.circuit_rejected.fetch_add(1, Ordering::Relaxed);
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                Err(SharedLimitError::CircuitOpen)
            }
            _ => Ok(()),
        }
    }

    fn settle<T>(&self, outcome: Result<T, SharedLimitError>) -> Result<T, SharedLimitError> {
        let mut circuit = self.circuit();
        match &outcome {
            Ok(_) => *circuit = Circuit::default(),
            Err(_) => {
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.policy.breaker_failure_threshold {
                    circuit.open_until = Some(Instant::now() + self.policy.breaker_open_duration);
                    self.counters.circuit_opened.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        outcome
    }

    #[must_use]
    pub(crate) fn window_key(&self, scope: &str, client: &str, epoch_sec: u64) -> String {
        format!("{}:rl:{scope}:{client}:{epoch_sec}", self.prefix)
    }

    async fn bump_window(&self, key: &str) -> Result<i64, SharedLimitError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let hits: i64 = conn.incr(key, 1_i64).await?;
        if hits == 1 {
            let _: bool = conn.expire(key, WINDOW_TTL_SECS).await?;
        }
        Ok(hits)
    }

    /// Counts one request for `client` in the current second and allows it
    /// while the window holds at most `refill_per_sec` (rounded up) requests.
    pub(crate) async fn rate_limit_allow(
        &self,
        scope: &str,
        client: &str,
        cfg: &RateLimitConfig,
    ) -> Result<bool, SharedLimitError> {
        self.admit(Instant::now())?;
        let epoch_sec = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(_) => return self.settle(Err(SharedLimitError::Clock)),
        };
        let key = self.window_key(scope, client, epoch_sec);
        let per_window = cfg.refill_per_sec.ceil().max(1.0) as i64;

        let mut outcome = Err(SharedLimitError::TimedOut(self.policy.timeout));
        for attempt in 1..=self.policy.retry_attempts.max(1) {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            outcome = match timeout(self.policy.timeout, self.bump_window(&key)).await {
                Ok(result) => result,
                Err(_) => Err(SharedLimitError::TimedOut(self.policy.timeout)),
            };
            if outcome.is_ok() {
                break;
            }
        }
        self.settle(outcome).map(|hits| hits <= per_window)
    }
}
