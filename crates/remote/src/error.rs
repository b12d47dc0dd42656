/// Errors from the remote service clients.
#[derive(Debug, thiserror::Error)]
pub enum RemoteApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service returned a non-2xx status code.
    #[error("Remote API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body, surfaced to the caller as-is.
        body: String,
    },

    /// The request body could not be built.
    #[error("Request could not be encoded: {0}")]
    Encode(String),

    /// The response arrived but did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl RemoteApiError {
    /// Upstream status code, when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            Self::Encode(_) | Self::Decode(_) => None,
        }
    }
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`RemoteApiError::ApiError`] carrying the status
/// and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(RemoteApiError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
