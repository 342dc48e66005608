// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::SocketAddr;

const REQUEST_ID_MAX_LEN: usize = 128;
const UNKNOWN_CLIENT: &str = "unknown";

/// Per-request identity, stored in request extensions by the tracing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestTrace {
    pub request_id: String,
    pub client_ip: String,
}

pub(crate) fn normalized_header_value(headers: &HeaderMap, key: &str, max_len: usize) -> Option<String> {
    let raw = headers.get(key)?.to_str().ok()?.trim();
    if raw.is_empty() || raw.len() > max_len {
        return None;
    }
    Some(raw.to_string())
}

fn normalized_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(first.to_string())
    } else {
        None
    }
}

#[must_use]
pub(crate) fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    normalized_forwarded_for(headers)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[must_use]
pub(crate) fn extract_request_trace(
    headers: &HeaderMap,
    extensions: &Extensions,
    state: &AppState,
) -> RequestTrace {
    let request_id = normalized_header_value(headers, "x-request-id", REQUEST_ID_MAX_LEN)
        .unwrap_or_else(|| {
            let id = state
                .request_id_seed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            format!("req-{id:016x}")
        });
    RequestTrace {
        request_id,
        client_ip: client_ip(headers, extensions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use folio_store::SqliteStore;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(SqliteStore::open_in_memory().expect("store")))
    }

    #[test]
    fn keeps_caller_request_id_and_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-abc"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let trace = extract_request_trace(&headers, &Extensions::new(), &state());
        assert_eq!(trace.request_id, "req-abc");
        assert_eq!(trace.client_ip, "203.0.113.9");
    }

    #[test]
    fn generates_sequential_ids_and_uses_peer_address() {
        let state = state();
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let first = extract_request_trace(&HeaderMap::new(), &extensions, &state);
        let second = extract_request_trace(&HeaderMap::new(), &extensions, &state);
        assert_eq!(first.request_id, "req-0000000000000001");
        assert_eq!(second.request_id, "req-0000000000000002");
        assert_eq!(first.client_ip, "127.0.0.1");
    }

    #[test]
    fn rejects_forwarded_values_with_odd_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("<script>"));
        assert_eq!(client_ip(&headers, &Extensions::new()), "unknown");
    }
}
