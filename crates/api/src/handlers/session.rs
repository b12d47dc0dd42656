//! Handlers for the session exemption flag.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::session::{issue_session_token, session_cookie, Session};
use crate::state::AppState;

/// Request body for `POST /api/v1/session/code`.
#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Current session state.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub exempt: bool,
}

/// GET /api/v1/session
pub async fn get_session(session: Session) -> Json<DataResponse<SessionStatus>> {
    Json(DataResponse {
        data: SessionStatus {
            exempt: session.exempt,
        },
    })
}

/// POST /api/v1/session/code
///
/// A matching code sets the exemption flag; any other code clears it. Either
/// way a fresh session cookie is issued.
pub async fn submit_code(
    State(state): State<AppState>,
    Json(input): Json<CodeRequest>,
) -> AppResult<Response> {
    let config = &state.config.session;
    let exempt = config.code_matches(&input.code);

    let token = issue_session_token(exempt, config)
        .map_err(|e| AppError::InternalError(format!("Failed to sign session: {e}")))?;

    tracing::info!(exempt, "Exemption code submitted");

    Ok((
        [(SET_COOKIE, session_cookie(&token, config))],
        Json(DataResponse {
            data: SessionStatus { exempt },
        }),
    )
        .into_response())
}
