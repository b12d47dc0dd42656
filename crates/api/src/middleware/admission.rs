//! Rate-limit admission extractor for Axum handlers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use photosheet_core::admission::{render_retry_deadline, Admission};

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// Client key used when neither a forwarded address nor the peer address is
/// known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Proof that the request passed admission. Extracting it counts the request
/// against every configured window unless the session is exempt.
///
/// Because it is a parts extractor, it runs before the request body is read:
/// a rejected upload is never decoded.
///
/// ```ignore
/// async fn my_handler(admitted: Admitted, mut multipart: Multipart) -> AppResult<Response> {
///     tracing::info!(client = %admitted.client_key, "admitted");
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Admitted {
    /// Rate limit key the request was counted under.
    pub client_key: String,
    /// `Exempt` or `Admitted`.
    pub admission: Admission,
}

impl FromRequestParts<AppState> for Admitted {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_parts(parts, state);
        let client_key = client_key(parts, state.config.rate_limit.trusted_proxy_hops);
        let now = chrono::Utc::now();

        let admission = state
            .admission
            .admit(&client_key, session.exempt, now)
            .await?;

        match admission {
            Admission::Rejected { retry_after } => {
                let rate_limit = &state.config.rate_limit;
                let deadline = render_retry_deadline(
                    now,
                    retry_after,
                    rate_limit.display_offset,
                    &rate_limit.display_label,
                );
                Err(AppError::RateLimited {
                    retry_after,
                    deadline,
                })
            }
            allowed => Ok(Admitted {
                client_key,
                admission: allowed,
            }),
        }
    }
}

/// Rate limit key for a request.
///
/// With `trusted_proxy_hops == 0` the key is the peer address and
/// `X-Forwarded-For` is ignored. Otherwise the key is the forwarded entry
/// `trusted_proxy_hops` positions from the right: the address the outermost
/// trusted proxy saw. Entries further left are client-supplied. A header
/// shorter than the hop count falls back to the peer address.
pub fn client_key(parts: &Parts, trusted_proxy_hops: usize) -> String {
    if trusted_proxy_hops > 0 {
        if let Some(addr) = forwarded_client(parts, trusted_proxy_hops) {
            return addr;
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_client(parts: &Parts, hops: usize) -> Option<String> {
    let hops_seen: Vec<&str> = parts
        .headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let index = hops_seen.len().checked_sub(hops)?;
    Some(hops_seen[index].to_string())
}
