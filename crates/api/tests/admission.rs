//! Integration tests for rate limiting and the session exemption flag.

mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use common::{body_json, body_text, get, post_json, sample_png, session_cookie_pair, upload, Part};
use image::RgbImage;
use photosheet_core::layout::LayoutConfig;
use photosheet_core::sheet::ComposedSheet;
use photosheet_pipeline::stages::{Compositor, GridCompositor};
use photosheet_pipeline::Pipeline;
use serde_json::json;
use tower::ServiceExt;

#[derive(Default)]
struct CountingCompositor {
    calls: AtomicUsize,
}

impl Compositor for CountingCompositor {
    fn compose(&self, photo: &RgbImage, layout: &LayoutConfig) -> ComposedSheet {
        self.calls.fetch_add(1, Ordering::SeqCst);
        GridCompositor.compose(photo, layout)
    }
}

async fn exempt_cookie(app: axum::Router) -> String {
    let response = post_json(
        app,
        "/api/v1/session/code",
        json!({ "code": common::TEST_EXEMPTION_CODE }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie_pair(&response)
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_over_the_limit_get_429_page() {
    let app = common::build_test_app_with(common::test_config(2), Pipeline::new());
    let png = sample_png();

    for _ in 0..2 {
        let response = upload(app.clone(), &[Part::File("image", &png)], "203.0.113.1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = upload(app, &[Part::File("image", &png)], "203.0.113.1", None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=86_400).contains(&retry_after));
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let page = body_text(response).await;
    assert!(page.contains("Too many requests"));
    assert!(page.contains("IST"));
}

#[tokio::test]
async fn rejected_request_never_reaches_pipeline() {
    let compositor = Arc::new(CountingCompositor::default());
    let pipeline = Pipeline::new().with_compositor(compositor.clone());
    let app = common::build_test_app_with(common::test_config(1), pipeline);
    let png = sample_png();

    upload(app.clone(), &[Part::File("image", &png)], "203.0.113.2", None).await;
    assert_eq!(compositor.calls.load(Ordering::SeqCst), 1);

    let response = upload(app, &[Part::File("image", &png)], "203.0.113.2", None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(compositor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let app = common::build_test_app_with(common::test_config(1), Pipeline::new());
    let png = sample_png();

    let first = upload(app.clone(), &[Part::File("image", &png)], "203.0.113.3", None).await;
    let other = upload(app.clone(), &[Part::File("image", &png)], "203.0.113.4", None).await;
    let again = upload(app, &[Part::File("image", &png)], "203.0.113.3", None).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(other.status(), StatusCode::OK);
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rate_limit_applies_before_input_checks() {
    let app = common::build_test_app_with(common::test_config(1), Pipeline::new());

    let first = upload(app.clone(), &[Part::Text("copies", "1")], "203.0.113.5", None).await;
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = upload(app, &[Part::Text("copies", "1")], "203.0.113.5", None).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rotating_forwarded_header_does_not_reset_peer_quota() {
    let mut config = common::test_config(1);
    config.rate_limit.trusted_proxy_hops = 0;
    let app = common::build_test_app_with(config, Pipeline::new());
    let png = sample_png();
    let peer = SocketAddr::from(([198, 51, 100, 7], 50_000));

    let mut statuses = Vec::new();
    for i in 0..5 {
        let mut request = common::upload_request(
            &[Part::File("image", &png)],
            &format!("10.0.0.{i}"),
            None,
        );
        request.extensions_mut().insert(ConnectInfo(peer));
        statuses.push(app.clone().oneshot(request).await.unwrap().status());
    }

    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses[1..]
        .iter()
        .all(|status| *status == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn spoofed_entries_left_of_trusted_hop_are_ignored() {
    let app = common::build_test_app_with(common::test_config(1), Pipeline::new());
    let png = sample_png();

    let first = upload(
        app.clone(),
        &[Part::File("image", &png)],
        "10.0.0.1, 203.0.113.8",
        None,
    )
    .await;
    let second = upload(
        app,
        &[Part::File("image", &png)],
        "10.0.0.2, 203.0.113.8",
        None,
    )
    .await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

// ---------------------------------------------------------------------------
// Exemption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exempt_session_is_never_limited() {
    let app = common::build_test_app_with(common::test_config(1), Pipeline::new());
    let cookie = exempt_cookie(app.clone()).await;
    let png = sample_png();

    for _ in 0..4 {
        let response = upload(
            app.clone(),
            &[Part::File("image", &png)],
            "203.0.113.6",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Exempt uploads did not consume the client's quota.
    let response = upload(app, &[Part::File("image", &png)], "203.0.113.6", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn exempt_session_passes_after_quota_is_spent() {
    let app = common::build_test_app_with(common::test_config(1), Pipeline::new());
    let png = sample_png();

    upload(app.clone(), &[Part::File("image", &png)], "203.0.113.7", None).await;
    let limited = upload(app.clone(), &[Part::File("image", &png)], "203.0.113.7", None).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    let cookie = exempt_cookie(app.clone()).await;
    let response = upload(
        app,
        &[Part::File("image", &png)],
        "203.0.113.7",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_endpoint_reports_flag() {
    let app = common::build_test_app();

    let json = body_json(get(app.clone(), "/api/v1/session", None).await).await;
    assert_eq!(json["data"]["exempt"], false);

    let cookie = exempt_cookie(app.clone()).await;
    let json = body_json(get(app, "/api/v1/session", Some(&cookie)).await).await;
    assert_eq!(json["data"]["exempt"], true);
}

#[tokio::test]
async fn wrong_code_clears_flag() {
    let app = common::build_test_app();

    let response = post_json(
        app.clone(),
        "/api/v1/session/code",
        json!({ "code": "not-the-code" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie_pair(&response);
    assert_eq!(body_json(response).await["data"]["exempt"], false);

    let json = body_json(get(app, "/api/v1/session", Some(&cookie)).await).await;
    assert_eq!(json["data"]["exempt"], false);
}

#[tokio::test]
async fn tampered_session_cookie_is_not_exempt() {
    let app = common::build_test_app();
    let json = body_json(
        get(
            app,
            "/api/v1/session",
            Some("photosheet_session=eyJhbGciOiJIUzI1NiJ9.e30.forged"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["exempt"], false);
}
