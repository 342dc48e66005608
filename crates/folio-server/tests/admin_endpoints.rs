// SPDX-License-Identifier: Apache-2.0

mod api_contracts_support;

use api_contracts_support::{
    admin_request, api_config_with_keys, field_names, header_value, parse_json, post_json,
    seed_experiment, send_raw, send_raw_with_method, spawn_server, ADMIN_KEY, VIEWER_KEY,
};
use folio_model::SessionId;

#[tokio::test]
async fn admin_routes_require_an_admin_key() {
    let server = spawn_server(api_config_with_keys()).await;

    let (status, _, body) = send_raw(server.addr, "/admin/ab-tests", &[]).await;
    assert_eq!(status, 401);
    assert_eq!(parse_json(&body)["code"], "Unauthorized");

    let (status, _, _) =
        send_raw(server.addr, "/admin/ab-tests", &[("x-api-key", "wrong-key")]).await;
    assert_eq!(status, 401);

    let (status, _, body) =
        send_raw(server.addr, "/admin/ab-tests", &[("x-api-key", VIEWER_KEY)]).await;
    assert_eq!(status, 403);
    assert_eq!(parse_json(&body)["details"]["required_role"], "admin");

    let bearer = format!("Bearer {ADMIN_KEY}");
    let (status, _, body) =
        send_raw(server.addr, "/admin/ab-tests", &[("Authorization", bearer.as_str())]).await;
    assert_eq!(status, 200);
    assert_eq!(parse_json(&body)["experiments"], serde_json::json!([]));
}

#[tokio::test]
async fn experiment_crud_round_trip() {
    let server = spawn_server(api_config_with_keys()).await;

    let (status, created) = admin_request(
        server.addr,
        "POST",
        "/admin/ab-tests",
        Some(
            r#"{"name":"hero_cta","description":"Hero button copy","trafficSplit":30,
                "targetPages":["/"],"controlVersion":{"text":"Start"},"variantVersion":{"text":"Go"}}"#,
        ),
    )
    .await;
    assert_eq!(status, 201, "{created}");
    let experiment = &created["experiment"];
    assert_eq!(experiment["name"], "hero_cta");
    assert_eq!(experiment["isActive"], false);
    assert_eq!(experiment["trafficSplit"], 30);
    assert_eq!(experiment["variantVersion"]["text"], "Go");
    let id = experiment["id"].as_str().expect("experiment id").to_string();

    let (status, updated) = admin_request(
        server.addr,
        "PATCH",
        &format!("/admin/ab-tests/{id}"),
        Some(r#"{"isActive":true,"trafficSplit":50}"#),
    )
    .await;
    assert_eq!(status, 200, "{updated}");
    assert_eq!(updated["experiment"]["isActive"], true);
    assert_eq!(updated["experiment"]["trafficSplit"], 50);
    assert_eq!(updated["experiment"]["description"], "Hero button copy");
    assert!(updated["experiment"]["startDate"].is_string());

    let (status, fetched) =
        admin_request(server.addr, "GET", &format!("/admin/ab-tests/{id}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(fetched["experiment"]["id"], id.as_str());

    let (status, listed) = admin_request(server.addr, "GET", "/admin/ab-tests", None).await;
    assert_eq!(status, 200);
    assert_eq!(listed["experiments"].as_array().map(Vec::len), Some(1));

    let (status, deleted) =
        admin_request(server.addr, "DELETE", &format!("/admin/ab-tests/{id}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(deleted, serde_json::json!({ "success": true }));

    let (status, missing) =
        admin_request(server.addr, "GET", &format!("/admin/ab-tests/{id}"), None).await;
    assert_eq!(status, 404);
    assert_eq!(missing["error"], "Experiment not found");
}

#[tokio::test]
async fn duplicate_names_conflict() {
    let server = spawn_server(api_config_with_keys()).await;
    seed_experiment(server.store(), "hero_cta", false);
    let (status, body) =
        admin_request(server.addr, "POST", "/admin/ab-tests", Some(r#"{"name":"hero_cta"}"#)).await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "Conflict");
}

#[tokio::test]
async fn create_validates_fields() {
    let server = spawn_server(api_config_with_keys()).await;
    let (status, body) = admin_request(
        server.addr,
        "POST",
        "/admin/ab-tests",
        Some(r#"{"description":"no name","trafficSplit":150}"#),
    )
    .await;
    assert_eq!(status, 400);
    let fields = field_names(&body);
    assert!(fields.contains(&"name".to_string()), "{fields:?}");
    assert!(fields.contains(&"trafficSplit".to_string()), "{fields:?}");

    let (status, body) = admin_request(
        server.addr,
        "POST",
        "/admin/ab-tests",
        Some(r#"{"name":"x","winner":"variant"}"#),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(field_names(&body), vec!["body".to_string()]);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let server = spawn_server(api_config_with_keys()).await;
    let (status, _) = admin_request(
        server.addr,
        "GET",
        "/admin/ab-tests/7d9f2c1e-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = admin_request(
        server.addr,
        "PATCH",
        "/admin/ab-tests/7d9f2c1e-0000-4000-8000-000000000000",
        Some(r#"{"isActive":true}"#),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = admin_request(
        server.addr,
        "DELETE",
        "/admin/ab-tests/7d9f2c1e-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, 404);

    let (status, body) =
        admin_request(server.addr, "GET", "/admin/ab-tests/bad_id", None).await;
    assert_eq!(status, 400);
    assert_eq!(field_names(&body), vec!["id".to_string()]);
}

#[tokio::test]
async fn deleting_an_experiment_drops_its_assignments() {
    let server = spawn_server(api_config_with_keys()).await;
    let exp = seed_experiment(server.store(), "hero_cta", true);
    let (status, _) = post_json(
        server.addr,
        "/analytics/ab-test/assign",
        r#"{"sessionId":"s_cascade","experimentName":"hero_cta","variant":"control"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(server.store().assignment_count(&exp.id).expect("count"), 1);

    let (status, _) = admin_request(
        server.addr,
        "DELETE",
        &format!("/admin/ab-tests/{}", exp.id),
        None,
    )
    .await;
    assert_eq!(status, 200);
    let remaining = server
        .store()
        .assignments_for_session(&SessionId::parse("s_cascade").expect("session id"))
        .expect("assignments");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn dashboard_reports_recent_traffic() {
    let server = spawn_server(api_config_with_keys()).await;
    post_json(
        server.addr,
        "/analytics/session",
        r#"{"sessionId":"s_dash","action":"start","page":"/"}"#,
    )
    .await;
    for path in ["/", "/", "/blog"] {
        let body = serde_json::json!({ "sessionId": "s_dash", "path": path });
        post_json(server.addr, "/analytics/pageview", &body.to_string()).await;
    }

    let (status, report) =
        admin_request(server.addr, "GET", "/admin/analytics?range=24h", None).await;
    assert_eq!(status, 200, "{report}");
    assert_eq!(report["range"], "24h");
    assert_eq!(report["overview"]["totalViews"], 3);
    assert_eq!(report["overview"]["uniqueVisitors"], 1);
    assert_eq!(report["topPages"][0]["path"], "/");
    assert_eq!(report["topPages"][0]["views"], 2);

    let (status, report) =
        admin_request(server.addr, "GET", "/admin/analytics?range=2w", None).await;
    assert_eq!(status, 200);
    assert_eq!(report["range"], "7d");
}

#[tokio::test]
async fn request_id_is_echoed_and_generated() {
    let server = spawn_server(api_config_with_keys()).await;
    let (status, head, _) =
        send_raw(server.addr, "/healthz", &[("x-request-id", "req-client-supplied")]).await;
    assert_eq!(status, 200);
    assert_eq!(header_value(&head, "x-request-id"), Some("req-client-supplied"));

    let (status, head, body) = send_raw(server.addr, "/does-not-exist", &[]).await;
    assert_eq!(status, 404);
    let generated = header_value(&head, "x-request-id").expect("generated request id");
    assert!(generated.starts_with("req-"));
    assert_eq!(parse_json(&body)["requestId"], generated);
}

#[tokio::test]
async fn readiness_tracks_drain_flag() {
    let server = spawn_server(api_config_with_keys()).await;
    let (status, _, body) = send_raw(server.addr, "/readyz", &[]).await;
    assert_eq!(status, 200);
    assert_eq!(parse_json(&body)["status"], "ready");

    server
        .state
        .ready
        .store(false, std::sync::atomic::Ordering::Relaxed);
    let (status, _, body) = send_raw(server.addr, "/readyz", &[]).await;
    assert_eq!(status, 503);
    assert_eq!(parse_json(&body)["code"], "NotReady");
}

#[tokio::test]
async fn openapi_document_lists_every_route() {
    let server = spawn_server(api_config_with_keys()).await;
    let (status, _, body) =
        send_raw_with_method(server.addr, "GET", "/openapi.json", &[], None).await;
    assert_eq!(status, 200);
    let doc = parse_json(&body);
    for path in [
        "/analytics/ab-test/assign",
        "/analytics/ab-test/convert",
        "/analytics/session",
        "/analytics/pageview",
        "/analytics/performance",
        "/analytics/engagement",
        "/analytics/conversion",
        "/admin/ab-tests",
        "/admin/ab-tests/{id}",
        "/admin/analytics",
        "/healthz",
        "/readyz",
    ] {
        assert!(doc["paths"][path].is_object(), "openapi missing {path}");
    }
}
