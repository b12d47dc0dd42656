//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, get};
use photosheet_pipeline::stages::Enhancer;
use photosheet_pipeline::{Pipeline, ProcessingResult};

struct NoopEnhancer;

#[async_trait]
impl Enhancer for NoopEnhancer {
    async fn enhance(&self, png: Vec<u8>) -> ProcessingResult<Vec<u8>> {
        Ok(png)
    }
}

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app();
    let response = get(app, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["counter_backend"], "memory");
    assert_eq!(json["remote_stages"], serde_json::json!([]));
}

#[tokio::test]
async fn health_check_lists_enabled_remote_stages() {
    let pipeline = Pipeline::new().with_enhancer(Arc::new(NoopEnhancer));
    let app = common::build_test_app_with(common::test_config(5), pipeline);

    let json = body_json(get(app, "/health", None).await).await;
    assert_eq!(json["remote_stages"], serde_json::json!(["enhancement"]));
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app();
    let response = get(app, "/this-route-does-not-exist", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app();
    let response = get(app, "/health", None).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
