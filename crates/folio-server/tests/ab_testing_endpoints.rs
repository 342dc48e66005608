// SPDX-License-Identifier: Apache-2.0

mod api_contracts_support;

use api_contracts_support::{
    field_names, post_json, seed_experiment, send_raw_with_method, spawn_server,
};
use chrono::Utc;
use folio_model::{Arm, ExperimentName, SessionId, VariantLabel};
use folio_server::ApiConfig;
use folio_store::ViewCounting;

fn beacon(session: &str, experiment: &str, variant: &str) -> String {
    serde_json::json!({
        "sessionId": session,
        "experimentName": experiment,
        "variant": variant,
    })
    .to_string()
}

#[tokio::test]
async fn assign_then_convert_counts_view_and_conversion() {
    let server = spawn_server(ApiConfig::default()).await;
    let exp = seed_experiment(server.store(), "hero_cta", true);

    let (status, body) = post_json(
        server.addr,
        "/analytics/ab-test/assign",
        &beacon("session_1_abc", "hero_cta", "variant"),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({ "success": true }));

    let (status, body) = post_json(
        server.addr,
        "/analytics/ab-test/convert",
        &beacon("session_1_abc", "hero_cta", "variant"),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let stored = server
        .store()
        .get_experiment(&exp.id)
        .expect("get")
        .expect("experiment");
    assert_eq!(stored.variant_views, 1);
    assert_eq!(stored.variant_conversions, 1);
    assert_eq!(stored.control_views, 0);
    assert_eq!(stored.p_value, None);
}

#[tokio::test]
async fn unknown_or_inactive_experiment_is_not_found() {
    let server = spawn_server(ApiConfig::default()).await;
    let paused = seed_experiment(server.store(), "paused_test", false);

    for name in ["does_not_exist", "paused_test"] {
        for path in ["/analytics/ab-test/assign", "/analytics/ab-test/convert"] {
            let (status, body) = post_json(server.addr, path, &beacon("s1", name, "control")).await;
            assert_eq!(status, 404, "{path} {name}");
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], "Experiment not found or inactive");
        }
    }
    assert_eq!(
        server.store().assignment_count(&paused.id).expect("count"),
        0
    );
}

#[tokio::test]
async fn missing_fields_are_reported_per_field() {
    let server = spawn_server(ApiConfig::default()).await;
    let (status, body) = post_json(
        server.addr,
        "/analytics/ab-test/assign",
        r#"{"experimentName":"hero_cta"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "ValidationFailed");
    let fields = field_names(&body);
    assert!(fields.contains(&"sessionId".to_string()), "{fields:?}");
    assert!(fields.contains(&"variant".to_string()), "{fields:?}");
    assert!(body["requestId"].as_str().is_some_and(|id| id.starts_with("req-")));
}

#[tokio::test]
async fn malformed_json_is_a_body_field_error() {
    let server = spawn_server(ApiConfig::default()).await;
    let (status, body) = post_json(server.addr, "/analytics/ab-test/assign", "{not json").await;
    assert_eq!(status, 400);
    assert_eq!(field_names(&body), vec!["body".to_string()]);
}

#[tokio::test]
async fn text_plain_beacons_are_accepted() {
    let server = spawn_server(ApiConfig::default()).await;
    seed_experiment(server.store(), "hero_cta", true);
    let payload = beacon("session_beacon", "hero_cta", "control");
    let (status, _, _) = send_raw_with_method(
        server.addr,
        "POST",
        "/analytics/ab-test/assign",
        &[("Content-Type", "text/plain;charset=UTF-8")],
        Some(&payload),
    )
    .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn repeat_assignment_keeps_one_row_and_counts_every_view() {
    let server = spawn_server(ApiConfig::default()).await;
    let exp = seed_experiment(server.store(), "hero_cta", true);
    for _ in 0..2 {
        let (status, _) = post_json(
            server.addr,
            "/analytics/ab-test/assign",
            &beacon("session_repeat", "hero_cta", "control"),
        )
        .await;
        assert_eq!(status, 200);
    }
    let stored = server
        .store()
        .get_experiment(&exp.id)
        .expect("get")
        .expect("experiment");
    assert_eq!(server.store().assignment_count(&exp.id).expect("count"), 1);
    assert_eq!(stored.control_views, 2);
}

#[tokio::test]
async fn first_assignment_counting_ignores_repeats() {
    let server = spawn_server(ApiConfig {
        view_counting: ViewCounting::FirstAssignment,
        ..ApiConfig::default()
    })
    .await;
    let exp = seed_experiment(server.store(), "hero_cta", true);
    for _ in 0..3 {
        post_json(
            server.addr,
            "/analytics/ab-test/assign",
            &beacon("session_repeat", "hero_cta", "variant"),
        )
        .await;
    }
    let stored = server
        .store()
        .get_experiment(&exp.id)
        .expect("get")
        .expect("experiment");
    assert_eq!(stored.variant_views, 1);
}

#[tokio::test]
async fn second_conversion_for_a_session_is_not_counted() {
    let server = spawn_server(ApiConfig::default()).await;
    let exp = seed_experiment(server.store(), "hero_cta", true);
    post_json(
        server.addr,
        "/analytics/ab-test/assign",
        &beacon("session_once", "hero_cta", "control"),
    )
    .await;
    for _ in 0..2 {
        let (status, _) = post_json(
            server.addr,
            "/analytics/ab-test/convert",
            &beacon("session_once", "hero_cta", "control"),
        )
        .await;
        assert_eq!(status, 200);
    }
    let stored = server
        .store()
        .get_experiment(&exp.id)
        .expect("get")
        .expect("experiment");
    assert_eq!(stored.control_conversions, 1);
}

#[tokio::test]
async fn conversion_without_prior_assignment_is_counted() {
    let server = spawn_server(ApiConfig::default()).await;
    let exp = seed_experiment(server.store(), "hero_cta", true);
    let (status, _) = post_json(
        server.addr,
        "/analytics/ab-test/convert",
        &beacon("session_cold", "hero_cta", "variant"),
    )
    .await;
    assert_eq!(status, 200);
    let stored = server
        .store()
        .get_experiment(&exp.id)
        .expect("get")
        .expect("experiment");
    assert_eq!(stored.variant_conversions, 1);
    assert_eq!(server.store().assignment_count(&exp.id).expect("count"), 0);
}

#[tokio::test]
async fn conversion_past_minimum_sample_records_significance() {
    let server = spawn_server(ApiConfig::default()).await;
    let exp = seed_experiment(server.store(), "pricing_page", true);
    let name = ExperimentName::parse("pricing_page").expect("name");
    let store = server.store();
    for (prefix, label, conversions) in [("c", "control", 20), ("v", "variant", 39)] {
        let variant = VariantLabel::parse(label).expect("label");
        for i in 0..200 {
            let session = SessionId::parse(&format!("{prefix}_{i}")).expect("session");
            store
                .assign(&session, &name, &variant, ViewCounting::EveryAssignment, Utc::now())
                .expect("assign");
            if i < conversions {
                store
                    .convert(&session, &name, &variant, Utc::now())
                    .expect("convert");
            }
        }
    }
    let before = store.get_experiment(&exp.id).expect("get").expect("experiment");
    assert_eq!(before.p_value, None);

    let (status, _) = post_json(
        server.addr,
        "/analytics/ab-test/convert",
        &beacon("v_150", "pricing_page", "variant"),
    )
    .await;
    assert_eq!(status, 200);

    let after = store.get_experiment(&exp.id).expect("get").expect("experiment");
    assert_eq!(after.variant_conversions, 40);
    assert!(after.is_significant);
    assert_eq!(after.winner, Some(Arm::Variant));
    assert_eq!(after.confidence_level, Some(0.95));
    assert!(after.p_value.is_some_and(|p| p < 0.05));
}
