//! Integration tests for the analysis API
//!
//! Demo mode keeps every provider offline, so these tests exercise the
//! full submit -> fan-out -> fuse -> ticket -> complete pipeline through
//! the real router without any network access.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt;

use pyro_api::providers::ProviderSet;
use pyro_api::{build_router, AppState};
use pyro_common::config::TomlConfig;

fn create_test_app() -> axum::Router {
    let mut config = TomlConfig::default();
    config.analysis.budget_secs = 5;
    let providers = ProviderSet::from_config(&config);
    build_router(AppState::new(config, providers))
}

/// Test app whose live providers point at an unreachable local port, so
/// probes fail fast instead of touching the network
fn create_unreachable_app() -> axum::Router {
    let mut config = TomlConfig::default();
    config.providers.weather_base_url = "http://127.0.0.1:9".to_string();
    config.providers.overpass_base_url = "http://127.0.0.1:9".to_string();
    let providers = ProviderSet::from_config(&config);
    build_router(AppState::new(config, providers))
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Poll the result endpoint until the analysis reaches a terminal status
async fn await_terminal(app: &axum::Router, analysis_id: &str) -> Value {
    for _ in 0..100 {
        let response = get(app, &format!("/api/analyze/{}/result", analysis_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let record = response_json(response).await;
        if record["status"] != "processing" {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("analysis {} did not reach a terminal status", analysis_id);
}

#[tokio::test]
async fn test_out_of_bounds_coordinates_rejected_synchronously() {
    let app = create_test_app();

    // San Francisco is well outside the Hawaiian Islands
    let response = post_json(
        &app,
        "/api/analyze",
        json!({"latitude": 37.7749, "longitude": -122.4194, "demo_mode": true}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Hawaiian Islands"));
}

#[tokio::test]
async fn test_result_for_unknown_analysis_is_404() {
    let app = create_test_app();
    let response = get(
        &app,
        "/api/analyze/00000000-0000-0000-0000-000000000000/result",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_events_for_unknown_analysis_is_404() {
    let app = create_test_app();
    let response = get(
        &app,
        "/api/analyze/00000000-0000-0000-0000-000000000000/events",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demo_analysis_runs_to_completion_with_ticket() {
    let app = create_test_app();

    let response = post_json(
        &app,
        "/api/analyze",
        json!({"latitude": 20.8783, "longitude": -156.6825, "demo_mode": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let submitted = response_json(response).await;
    assert_eq!(submitted["status"], "processing");
    let analysis_id = submitted["analysis_id"].as_str().unwrap().to_string();
    assert!(!analysis_id.is_empty());
    assert_eq!(
        submitted["progress_url"],
        format!("/api/analyze/{}/events", analysis_id)
    );

    let record = await_terminal(&app, &analysis_id).await;
    assert_eq!(record["status"], "completed");

    // All three slots resolved with demo data
    for slot in ["vegetation", "weather", "infrastructure"] {
        assert_eq!(
            record["observations"][slot]["outcome"], "success",
            "slot {} did not resolve successfully",
            slot
        );
    }

    let assessment = &record["risk_assessment"];
    let risk_level = assessment["risk_level"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&risk_level));
    // Demo data for West Maui lands above the default 0.3 ticket threshold
    assert!(risk_level >= 0.3, "risk level {} below threshold", risk_level);
    assert!(assessment["rationale"].as_str().unwrap().len() > 20);

    // Ticket created with the estimated URL (no webhook configured)
    let ticket_url = record["ticket_url"].as_str().unwrap();
    assert!(ticket_url.contains("/browse/PYRO-"), "url: {}", ticket_url);
}

#[tokio::test]
async fn test_terminal_analysis_replays_over_sse() {
    let app = create_test_app();

    let response = post_json(
        &app,
        "/api/analyze",
        json!({"latitude": 21.3099, "longitude": -157.8581, "demo_mode": true}),
    )
    .await;
    let submitted = response_json(response).await;
    let analysis_id = submitted["analysis_id"].as_str().unwrap().to_string();

    await_terminal(&app, &analysis_id).await;

    // A late subscriber gets Connected + the terminal event, then the
    // stream completes (so collecting the body terminates).
    let response = get(&app, &format!("/api/analyze/{}/events", analysis_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8_lossy(&bytes);
    assert!(body.contains("event: Connected"), "body: {}", body);
    assert!(body.contains("event: Completed"), "body: {}", body);
    assert!(body.contains("\"status\":\"completed\""), "body: {}", body);
}

#[tokio::test]
async fn test_cancel_after_completion_conflicts() {
    let app = create_test_app();

    let response = post_json(
        &app,
        "/api/analyze",
        json!({"latitude": 19.7633, "longitude": -155.5739, "demo_mode": true}),
    )
    .await;
    let submitted = response_json(response).await;
    let analysis_id = submitted["analysis_id"].as_str().unwrap().to_string();

    await_terminal(&app, &analysis_id).await;

    let response = post_json(
        &app,
        &format!("/api/analyze/{}/cancel", analysis_id),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_unknown_analysis_is_404() {
    let app = create_test_app();
    let response = post_json(
        &app,
        "/api/analyze/00000000-0000-0000-0000-000000000000/cancel",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demo_locations_are_inside_service_region() {
    let app = create_test_app();
    let response = get(&app, "/api/demo-locations").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let locations = body["locations"].as_array().unwrap();
    assert_eq!(locations.len(), 4);

    for location in locations {
        let latitude = location["latitude"].as_f64().unwrap();
        let longitude = location["longitude"].as_f64().unwrap();
        assert!(
            pyro_common::geo::Coordinates::new(latitude, longitude).is_in_hawaii(),
            "demo location {} outside service region",
            location["name"]
        );
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pyro-api");
}

#[tokio::test]
async fn test_system_status_reports_all_providers() {
    let app = create_unreachable_app();
    let response = get(&app, "/api/system-status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["system"], "PyroGuard Sentinel");

    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 4);

    // Vegetation tiers have no API keys, ticketing has no webhook
    let statuses: Vec<&str> = providers
        .iter()
        .map(|p| p["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"unconfigured"));
    // Weather and overpass point at an unreachable port
    assert_eq!(body["overall_status"], "degraded");
}
