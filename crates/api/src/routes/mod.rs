pub mod health;
pub mod process;
pub mod session;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /process                 upload photo, download sheet (POST, rate limited)
/// /session                 current exemption flag (GET)
/// /session/code            submit exemption code (POST)
/// ```
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(process::router(max_upload_bytes))
        .merge(session::router())
}
