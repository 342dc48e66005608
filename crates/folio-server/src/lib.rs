#![forbid(unsafe_code)]
//! HTTP surface for folio: experiment beacons, analytics ingestion and the
//! admin API, served with axum over a SQLite store.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use folio_core::{SubstringClassifier, UserAgentClassifier};
use folio_store::SqliteStore;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;
use telemetry::rate_limiter::RateLimiter;
use telemetry::redis_backend::{RedisBackend, RedisPolicy};

mod config;
mod http;
mod middleware;
mod services;
mod telemetry;

pub use config::{validate_startup_config, ApiConfig, RateLimitConfig, Role};
pub use services::ServiceError;

pub const CRATE_NAME: &str = "folio-server";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub api: Arc<ApiConfig>,
    pub classifier: Arc<dyn UserAgentClassifier>,
    pub ready: Arc<AtomicBool>,
    pub(crate) ip_limiter: Arc<RateLimiter>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

fn rate_limit_backend(api: &ApiConfig) -> Option<RedisBackend> {
    if !api.enable_redis_rate_limit {
        return None;
    }
    let url = api.redis_url.as_deref()?;
    let policy = RedisPolicy {
        timeout: Duration::from_millis(api.redis_timeout_ms),
        retry_attempts: api.redis_retry_attempts,
        breaker_failure_threshold: api.redis_breaker_failure_threshold,
        breaker_open_duration: Duration::from_millis(api.redis_breaker_open_ms),
    };
    match RedisBackend::new(url, &api.redis_prefix, policy) {
        Ok(backend) => Some(backend),
        Err(e) => {
            tracing::warn!("redis rate limit disabled, invalid url: {e}");
            None
        }
    }
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self::with_config(store, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<SqliteStore>, api: ApiConfig) -> Self {
        Self {
            store,
            ip_limiter: Arc::new(RateLimiter::new(
                rate_limit_backend(&api),
                "ip",
                api.max_tracked_clients,
            )),
            classifier: Arc::new(SubstringClassifier::default()),
            ready: Arc::new(AtomicBool::new(true)),
            request_id_seed: Arc::new(AtomicU64::new(1)),
            api: Arc::new(api),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn UserAgentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Rate-limit decisions that fell back to local buckets after a Redis error.
    #[must_use]
    pub fn rate_limit_fallbacks(&self) -> u64 {
        self.ip_limiter.redis_fallbacks()
    }
}

pub fn build_router(state: AppState) -> Router {
    let analytics = Router::new()
        .route(
            "/analytics/ab-test/assign",
            post(http::analytics::assign_handler),
        )
        .route(
            "/analytics/ab-test/convert",
            post(http::analytics::convert_handler),
        )
        .route("/analytics/session", post(http::analytics::session_handler))
        .route("/analytics/pageview", post(http::analytics::pageview_handler))
        .route(
            "/analytics/performance",
            post(http::analytics::performance_handler),
        )
        .route(
            "/analytics/engagement",
            post(http::analytics::engagement_handler),
        )
        .route(
            "/analytics/conversion",
            post(http::analytics::conversion_handler),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    let admin = Router::new()
        .route(
            "/admin/ab-tests",
            get(http::admin::list_experiments_handler).post(http::admin::create_experiment_handler),
        )
        .route(
            "/admin/ab-tests/:id",
            get(http::admin::get_experiment_handler)
                .patch(http::admin::update_experiment_handler)
                .delete(http::admin::delete_experiment_handler),
        )
        .route("/admin/analytics", get(http::admin::dashboard_handler))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/openapi.json", get(http::handlers::openapi_handler))
        .merge(analytics)
        .merge(admin)
        .fallback(http::handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .with_state(state)
}
