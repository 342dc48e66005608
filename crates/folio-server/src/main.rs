#![forbid(unsafe_code)]

use folio_server::{build_router, validate_startup_config, ApiConfig, AppState};
use folio_store::SqliteStore;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;
    init_tracing(api_cfg.log_json);

    let bind_addr = env::var("FOLIO_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_path = PathBuf::from(
        env::var("FOLIO_DB_PATH").unwrap_or_else(|_| "artifacts/folio.sqlite".to_string()),
    );

    validate_startup_config(&api_cfg)?;
    if api_cfg.api_keys.is_empty() {
        warn!("FOLIO_API_KEYS is empty; every /admin request will be rejected");
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("create {}: {e}", parent.display()))?;
    }
    let store = tokio::task::spawn_blocking({
        let db_path = db_path.clone();
        move || SqliteStore::open(&db_path)
    })
    .await
    .map_err(|e| format!("store open task failed: {e}"))?
    .map_err(|e| format!("open store {}: {e}", db_path.display()))?;
    info!(
        path = %db_path.display(),
        view_counting = api_cfg.view_counting.as_str(),
        redis_rate_limit = api_cfg.enable_redis_rate_limit,
        "store ready"
    );

    let drain = api_cfg.shutdown_drain;
    let state = AppState::with_config(Arc::new(store), api_cfg);
    let app = build_router(state.clone());

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!("folio-server listening on {bind_addr}");
    let ready = state.ready.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        wait_for_shutdown_signal().await;
        // Fail readiness, then drain in-flight requests.
        ready.store(false, Ordering::Relaxed);
        info!(drain_ms = drain.as_millis() as u64, "shutdown requested");
        tokio::time::sleep(drain).await;
    })
    .await
    .map_err(|e| format!("server failed: {e}"))
}
