#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::FixedOffset;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use photosheet_core::admission::AdmissionController;
use photosheet_core::counter_store::InMemoryCounterStore;
use photosheet_core::layout::LayoutConfig;
use photosheet_core::rate_limit::RateWindow;
use photosheet_pipeline::Pipeline;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use photosheet_api::config::{ExportConfig, RateLimitConfig, RemoteConfig, ServerConfig};
use photosheet_api::routes;
use photosheet_api::session::SessionConfig;
use photosheet_api::state::AppState;

pub const TEST_EXEMPTION_CODE: &str = "open-sesame";

const BOUNDARY: &str = "----photosheet-test-boundary";

/// Small page so composition and export stay fast: 3 photos per row,
/// 2 rows.
pub fn test_layout() -> LayoutConfig {
    LayoutConfig {
        photo_width: 40,
        photo_height: 50,
        border_px: 2,
        copies: 1,
        spacing_px: 6,
        margin_x: 10,
        margin_y: 10,
        horizontal_gap: 4,
        page_width: 150,
        page_height: 130,
    }
}

/// Test `ServerConfig` with safe defaults and `limit` requests per day,
/// behind one trusted proxy so `x-forwarded-for` names the client.
pub fn test_config(limit: u32) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        session: SessionConfig {
            secret: "test-session-secret".to_string(),
            expiry_days: 30,
            exemption_code: Some(TEST_EXEMPTION_CODE.to_string()),
        },
        rate_limit: RateLimitConfig {
            windows: vec![RateWindow::new(limit, Duration::from_secs(86_400))],
            fallback_retry_after: Duration::from_secs(600),
            display_offset: FixedOffset::east_opt(330 * 60).unwrap(),
            display_label: "IST".to_string(),
            trusted_proxy_hops: 1,
        },
        remote: RemoteConfig::default(),
        export: ExportConfig::default(),
        layout: test_layout(),
    }
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app_with(config: ServerConfig, pipeline: Pipeline) -> Router {
    let admission = AdmissionController::new(
        Arc::new(InMemoryCounterStore::new()),
        config.rate_limit.windows.clone(),
    )
    .with_fallback_retry_after(config.rate_limit.fallback_retry_after);

    let max_upload_bytes = config.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
        admission: Arc::new(admission),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes(max_upload_bytes))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Local-only pipeline, generous rate limit.
pub fn build_test_app() -> Router {
    build_test_app_with(test_config(100), Pipeline::new())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// One part of a multipart upload.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"photo.png\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Build a multipart upload request to `/api/v1/process`.
pub fn upload_request(parts: &[Part<'_>], client: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/process")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-forwarded-for", client);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Send a multipart upload.
pub async fn upload(
    app: Router,
    parts: &[Part<'_>],
    client: &str,
    cookie: Option<&str>,
) -> Response {
    app.oneshot(upload_request(parts, client, cookie))
        .await
        .unwrap()
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&json).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// `name=value` pair from a response's `Set-Cookie` header, ready to send
/// back as a `Cookie` header.
pub fn session_cookie_pair(response: &Response) -> String {
    response.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// A small opaque PNG.
pub fn sample_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(16, 20, Rgb([120, 80, 200]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
