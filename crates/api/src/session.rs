//! Signed client-side session carrying the rate-limit exemption flag.
//!
//! The session is an HS256 JWT stored in the [`SESSION_COOKIE`] cookie. A
//! missing, expired, or tampered token reads as a fresh session with the
//! flag cleared.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::state::AppState;

/// Cookie holding the session token.
pub const SESSION_COOKIE: &str = "photosheet_session";

/// Default session lifetime in days.
const DEFAULT_SESSION_EXPIRY_DAYS: i64 = 30;

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Whether this session bypasses rate limiting.
    pub exempt: bool,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

/// Session signing and exemption-code configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC-SHA256 secret used to sign session tokens.
    pub secret: String,
    /// Session lifetime in days.
    pub expiry_days: i64,
    /// Shared secret that sets the exemption flag. `None` means no code
    /// ever matches.
    pub exemption_code: Option<String>,
}

impl SessionConfig {
    /// Load session configuration from environment variables.
    ///
    /// | Env Var               | Required | Default |
    /// |-----------------------|----------|---------|
    /// | `SESSION_SECRET`      | **yes**  | --      |
    /// | `SESSION_EXPIRY_DAYS` | no       | `30`    |
    /// | `EXEMPTION_CODE`      | no       | unset   |
    ///
    /// # Panics
    ///
    /// Panics if `SESSION_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("SESSION_SECRET")
            .expect("SESSION_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "SESSION_SECRET must not be empty");

        let expiry_days: i64 = std::env::var("SESSION_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_SESSION_EXPIRY_DAYS.to_string())
            .parse()
            .expect("SESSION_EXPIRY_DAYS must be a valid i64");

        let exemption_code = std::env::var("EXEMPTION_CODE")
            .ok()
            .filter(|code| !code.is_empty());

        Self {
            secret,
            expiry_days,
            exemption_code,
        }
    }

    /// Compare a submitted code against the configured one in constant time.
    pub fn code_matches(&self, submitted: &str) -> bool {
        let Some(expected) = &self.exemption_code else {
            return false;
        };

        // Compared as fixed-length HMAC tags.
        let Ok(mut expected_mac) = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        expected_mac.update(expected.as_bytes());
        let expected_tag = expected_mac.finalize().into_bytes();

        let Ok(mut submitted_mac) = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        submitted_mac.update(submitted.as_bytes());
        submitted_mac.verify_slice(&expected_tag).is_ok()
    }
}

/// Issue a session token with the given exemption flag.
pub fn issue_session_token(
    exempt: bool,
    config: &SessionConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        exempt,
        exp: now + config.expiry_days * 86_400,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode a session token.
pub fn read_session_token(
    token: &str,
    config: &SessionConfig,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// `Set-Cookie` value storing `token` for the session lifetime.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.expiry_days * 86_400
    )
}

/// Find a cookie value in a `Cookie` request header.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// The caller's session state. Never rejects: an absent or invalid token is
/// a session without the exemption flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Session {
    pub exempt: bool,
}

impl Session {
    /// Read the session from the request's cookies.
    pub fn from_parts(parts: &Parts, state: &AppState) -> Self {
        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| find_cookie(header, SESSION_COOKIE));

        let Some(token) = token else {
            return Session::default();
        };

        match read_session_token(token, &state.config.session) {
            Ok(claims) => Session {
                exempt: claims.exempt,
            },
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session token");
                Session::default()
            }
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session::from_parts(parts, state))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(code: Option<&str>) -> SessionConfig {
        SessionConfig {
            secret: "test-session-secret".to_string(),
            expiry_days: 30,
            exemption_code: code.map(str::to_string),
        }
    }

    #[test]
    fn token_round_trips_exemption_flag() {
        let config = config(None);
        for exempt in [true, false] {
            let token = issue_session_token(exempt, &config).unwrap();
            let claims = read_session_token(&token, &config).unwrap();
            assert_eq!(claims.exempt, exempt);
            assert_eq!(claims.exp - claims.iat, 30 * 86_400);
        }
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_session_token(true, &config(None)).unwrap();
        let other = SessionConfig {
            secret: "another-secret".to_string(),
            ..config(None)
        };
        assert!(read_session_token(&token, &other).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = SessionConfig {
            expiry_days: -1,
            ..config(None)
        };
        let token = issue_session_token(true, &config).unwrap();
        assert!(read_session_token(&token, &config).is_err());
    }

    #[test]
    fn code_matches_only_configured_code() {
        let config = config(Some("let-me-in"));
        assert!(config.code_matches("let-me-in"));
        assert!(!config.code_matches("let-me-i"));
        assert!(!config.code_matches(""));
    }

    #[test]
    fn unset_code_never_matches() {
        let config = config(None);
        assert!(!config.code_matches(""));
        assert!(!config.code_matches("anything"));
    }

    #[test]
    fn finds_cookie_among_others() {
        let header = "theme=dark; photosheet_session=abc.def.ghi; lang=en";
        assert_eq!(find_cookie(header, SESSION_COOKIE), Some("abc.def.ghi"));
        assert_eq!(find_cookie("theme=dark", SESSION_COOKIE), None);
    }

    #[test]
    fn cookie_is_http_only_with_lifetime() {
        let cookie = session_cookie("tok", &config(None));
        assert!(cookie.starts_with("photosheet_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=2592000"));
    }
}
