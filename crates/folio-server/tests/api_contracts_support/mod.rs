#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use folio_model::{Experiment, ExperimentName, ExperimentPatch, NewExperiment};
use folio_server::{build_router, ApiConfig, AppState, Role};
use folio_store::SqliteStore;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const ADMIN_KEY: &str = "admin-key";
pub const VIEWER_KEY: &str = "viewer-key";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _dir: TempDir,
}

impl TestServer {
    pub fn store(&self) -> &SqliteStore {
        &self.state.store
    }
}

pub fn api_config_with_keys() -> ApiConfig {
    ApiConfig {
        api_keys: HashMap::from([
            (ADMIN_KEY.to_string(), Role::Admin),
            (VIEWER_KEY.to_string(), Role::Viewer),
        ]),
        ..ApiConfig::default()
    }
}

pub async fn spawn_server(api: ApiConfig) -> TestServer {
    spawn_server_with(api, |state| state).await
}

pub async fn spawn_server_with(
    api: ApiConfig,
    customize: impl FnOnce(AppState) -> AppState,
) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("folio.sqlite")).expect("open store");
    let state = customize(AppState::with_config(Arc::new(store), api));
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });
    TestServer {
        addr,
        state,
        _dir: dir,
    }
}

pub fn seed_experiment(store: &SqliteStore, name: &str, active: bool) -> Experiment {
    let created = store
        .create_experiment(
            &NewExperiment::named(ExperimentName::parse(name).expect("experiment name")),
            Utc::now(),
        )
        .expect("create experiment");
    if !active {
        return created;
    }
    store
        .update_experiment(
            &created.id,
            &ExperimentPatch {
                is_active: Some(true),
                ..ExperimentPatch::default()
            },
            Utc::now(),
        )
        .expect("activate experiment")
        .expect("experiment exists")
}

pub async fn send_raw(
    addr: SocketAddr,
    path: &str,
    headers: &[(&str, &str)],
) -> (u16, String, String) {
    send_raw_with_method(addr, "GET", path, headers, None).await
}

pub async fn send_raw_with_method(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    let body = body.unwrap_or_default();
    if !body.is_empty() || matches!(method, "POST" | "PATCH" | "PUT") {
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");
    req.push_str(body);
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .expect("status code");
    (status, head.to_string(), body.to_string())
}

pub async fn post_json(addr: SocketAddr, path: &str, body: &str) -> (u16, serde_json::Value) {
    let (status, _, body) = send_raw_with_method(
        addr,
        "POST",
        path,
        &[("Content-Type", "application/json")],
        Some(body),
    )
    .await;
    (status, parse_json(&body))
}

pub async fn admin_request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> (u16, serde_json::Value) {
    let (status, _, body) = send_raw_with_method(
        addr,
        method,
        path,
        &[("x-api-key", ADMIN_KEY), ("Content-Type", "application/json")],
        body,
    )
    .await;
    (status, parse_json(&body))
}

pub fn parse_json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("json body ({e}): {body}"))
}

pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

pub fn field_names(body: &serde_json::Value) -> Vec<String> {
    body["details"]["field_errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
