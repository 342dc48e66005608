// SPDX-License-Identifier: Apache-2.0

use folio_core::PerformanceBudget;
use folio_store::ViewCounting;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 30.0,
            refill_per_sec: 10.0,
        }
    }
}

impl RateLimitConfig {
    /// Whole seconds until an empty bucket holds one token again.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        if self.refill_per_sec <= 0.0 {
            return 1;
        }
        (1.0 / self.refill_per_sec).ceil().max(1.0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role `{other}`; use admin, editor or viewer")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub rate_limit_per_ip: RateLimitConfig,
    pub max_tracked_clients: usize,
    pub view_counting: ViewCounting,
    pub api_keys: HashMap<String, Role>,
    pub budget: PerformanceBudget,
    pub enable_audit_log: bool,
    pub log_json: bool,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub enable_redis_rate_limit: bool,
    pub redis_timeout_ms: u64,
    pub redis_retry_attempts: usize,
    pub redis_breaker_failure_threshold: u32,
    pub redis_breaker_open_ms: u64,
    pub shutdown_drain: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
            rate_limit_per_ip: RateLimitConfig::default(),
            max_tracked_clients: 10_000,
            view_counting: ViewCounting::default(),
            api_keys: HashMap::new(),
            budget: PerformanceBudget::default(),
            enable_audit_log: true,
            log_json: true,
            redis_url: None,
            redis_prefix: "folio".to_string(),
            enable_redis_rate_limit: false,
            redis_timeout_ms: 50,
            redis_retry_attempts: 2,
            redis_breaker_failure_threshold: 8,
            redis_breaker_open_ms: 3000,
            shutdown_drain: Duration::from_millis(5000),
        }
    }
}

fn env_bool(get: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    get(name)
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(get: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    get(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(get: &impl Fn(&str) -> Option<String>, name: &str, default: usize) -> usize {
    get(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f64(get: &impl Fn(&str) -> Option<String>, name: &str, default: f64) -> f64 {
    get(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_duration_ms(get: &impl Fn(&str) -> Option<String>, name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(get, name, default_ms))
}

fn env_map(get: &impl Fn(&str) -> Option<String>, name: &str) -> HashMap<String, String> {
    get(name)
        .unwrap_or_default()
        .split(',')
        .filter_map(|item| {
            let (k, v) = item.split_once('=')?;
            let key = k.trim();
            let value = v.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

impl ApiConfig {
    /// Reads `FOLIO_*` variables through `get`. Malformed numbers fall back to
    /// their defaults; unknown roles and view-counting modes are errors.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let budget_defaults = PerformanceBudget::default();

        let view_counting = match get("FOLIO_VIEW_COUNTING").as_deref().map(str::trim) {
            None | Some("") | Some("every") => ViewCounting::EveryAssignment,
            Some("first") => ViewCounting::FirstAssignment,
            Some(other) => {
                return Err(format!(
                    "invalid FOLIO_VIEW_COUNTING `{other}`; use every or first"
                ))
            }
        };

        let mut api_keys = HashMap::new();
        for (key, role) in env_map(&get, "FOLIO_API_KEYS") {
            let role = Role::parse(&role).map_err(|e| format!("FOLIO_API_KEYS: {e}"))?;
            api_keys.insert(key, role);
        }

        Ok(Self {
            max_body_bytes: env_usize(&get, "FOLIO_MAX_BODY_BYTES", defaults.max_body_bytes),
            rate_limit_per_ip: RateLimitConfig {
                capacity: env_f64(
                    &get,
                    "FOLIO_RATE_LIMIT_CAPACITY",
                    defaults.rate_limit_per_ip.capacity,
                ),
                refill_per_sec: env_f64(
                    &get,
                    "FOLIO_RATE_LIMIT_REFILL_PER_SEC",
                    defaults.rate_limit_per_ip.refill_per_sec,
                ),
            },
            max_tracked_clients: env_usize(
                &get,
                "FOLIO_RATE_LIMIT_MAX_CLIENTS",
                defaults.max_tracked_clients,
            ),
            view_counting,
            api_keys,
            budget: PerformanceBudget {
                lcp_ms: env_f64(&get, "FOLIO_BUDGET_LCP_MS", budget_defaults.lcp_ms),
                fid_ms: env_f64(&get, "FOLIO_BUDGET_FID_MS", budget_defaults.fid_ms),
                cls: env_f64(&get, "FOLIO_BUDGET_CLS", budget_defaults.cls),
                fcp_ms: env_f64(&get, "FOLIO_BUDGET_FCP_MS", budget_defaults.fcp_ms),
                ttfb_ms: env_f64(&get, "FOLIO_BUDGET_TTFB_MS", budget_defaults.ttfb_ms),
            },
            enable_audit_log: env_bool(&get, "FOLIO_ENABLE_AUDIT_LOG", defaults.enable_audit_log),
            log_json: env_bool(&get, "FOLIO_LOG_JSON", defaults.log_json),
            redis_url: get("FOLIO_REDIS_URL").filter(|v| !v.trim().is_empty()),
            redis_prefix: get("FOLIO_REDIS_PREFIX")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.redis_prefix),
            enable_redis_rate_limit: env_bool(&get, "FOLIO_ENABLE_REDIS_RATE_LIMIT", false),
            redis_timeout_ms: env_u64(&get, "FOLIO_REDIS_TIMEOUT_MS", defaults.redis_timeout_ms),
            redis_retry_attempts: env_usize(
                &get,
                "FOLIO_REDIS_RETRY_ATTEMPTS",
                defaults.redis_retry_attempts,
            ),
            redis_breaker_failure_threshold: env_u64(
                &get,
                "FOLIO_REDIS_BREAKER_FAILURE_THRESHOLD",
                u64::from(defaults.redis_breaker_failure_threshold),
            ) as u32,
            redis_breaker_open_ms: env_u64(
                &get,
                "FOLIO_REDIS_BREAKER_OPEN_MS",
                defaults.redis_breaker_open_ms,
            ),
            shutdown_drain: env_duration_ms(&get, "FOLIO_SHUTDOWN_DRAIN_MS", 5000),
        })
    }

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn role_for_key(&self, key: &str) -> Option<Role> {
        self.api_keys.get(key).copied()
    }
}

pub fn validate_startup_config(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if api.rate_limit_per_ip.capacity < 1.0 || api.rate_limit_per_ip.refill_per_sec <= 0.0 {
        return Err("rate limit requires capacity >= 1 and refill > 0".to_string());
    }
    if api.enable_redis_rate_limit && api.redis_url.is_none() {
        return Err("enable_redis_rate_limit=true requires FOLIO_REDIS_URL".to_string());
    }
    let b = &api.budget;
    if [b.lcp_ms, b.fid_ms, b.cls, b.fcp_ms, b.ttfb_ms]
        .iter()
        .any(|v| !v.is_finite() || *v <= 0.0)
    {
        return Err("performance budgets must be finite and > 0".to_string());
    }
    Ok(())
}
