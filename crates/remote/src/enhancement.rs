//! Client for a face-aware upscaling/restoration service (GFPGAN-style
//! Gradio `predict` endpoint).
//!
//! Request: `{"data": ["data:image/png;base64,...", <version>, <scale>]}`.
//! Response: `{"data": ["data:image/png;base64,...", ...]}` with the restored
//! image at index [`RESULT_INDEX`]. Everything about the response shape is
//! checked in [`decode_response`] so a changed upstream contract surfaces as
//! a precise [`RemoteApiError::Decode`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ensure_success, RemoteApiError};

/// Position of the restored image in the response `data` array.
pub const RESULT_INDEX: usize = 0;

/// Default restoration model version.
pub const DEFAULT_MODEL_VERSION: &str = "v1.4";

/// Default upscale factor.
pub const DEFAULT_SCALE: f32 = 2.0;

/// Remote-model parameters sent alongside the image.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceParams {
    pub model_version: String,
    pub scale: f32,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            scale: DEFAULT_SCALE,
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    data: (String, String, f32),
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    data: Vec<Value>,
}

/// HTTP client for the enhancement service.
pub struct EnhanceApi {
    client: reqwest::Client,
    api_url: String,
    params: EnhanceParams,
}

impl EnhanceApi {
    pub fn new(api_url: String, params: EnhanceParams) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, params)
    }

    pub fn with_client(client: reqwest::Client, api_url: String, params: EnhanceParams) -> Self {
        Self {
            client,
            api_url,
            params,
        }
    }

    /// Submit a PNG-encoded image and return the enhanced image bytes.
    pub async fn enhance(&self, png: &[u8]) -> Result<Vec<u8>, RemoteApiError> {
        let body = build_payload(png, &self.params)?;

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let response = ensure_success(response).await?;

        let raw = response.text().await?;
        decode_response(&raw)
    }
}

/// Build the JSON request body for `png`.
pub fn build_payload(png: &[u8], params: &EnhanceParams) -> Result<Value, RemoteApiError> {
    // serde_json writes non-finite floats as null.
    if !params.scale.is_finite() {
        return Err(RemoteApiError::Encode(format!(
            "scale must be a finite number, got {}",
            params.scale
        )));
    }

    let request = PredictRequest {
        data: (
            to_data_url(png),
            params.model_version.clone(),
            params.scale,
        ),
    };
    serde_json::to_value(request).map_err(|e| RemoteApiError::Encode(e.to_string()))
}

/// Validate the response shape and extract the embedded image bytes.
pub fn decode_response(raw: &str) -> Result<Vec<u8>, RemoteApiError> {
    let response: PredictResponse = serde_json::from_str(raw)
        .map_err(|e| RemoteApiError::Decode(format!("response is not a predict result: {e}")))?;

    let entry = response.data.get(RESULT_INDEX).ok_or_else(|| {
        RemoteApiError::Decode(format!(
            "response data has {} entries, expected an image at index {RESULT_INDEX}",
            response.data.len()
        ))
    })?;

    let encoded = entry.as_str().ok_or_else(|| {
        RemoteApiError::Decode(format!("data[{RESULT_INDEX}] is not a string"))
    })?;

    from_data_url(encoded)
}

/// Encode PNG bytes as a `data:image/png;base64,` URL.
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Decode a base64 data URL (or a bare base64 string) to bytes.
pub fn from_data_url(encoded: &str) -> Result<Vec<u8>, RemoteApiError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| RemoteApiError::Decode("data URL has no payload".into()))?;
            if !meta.ends_with(";base64") {
                return Err(RemoteApiError::Decode(format!(
                    "data URL is not base64-encoded ({meta})"
                )));
            }
            data
        }
        None => encoded,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| RemoteApiError::Decode(format!("invalid base64 image: {e}")))?;
    if bytes.is_empty() {
        return Err(RemoteApiError::Decode("embedded image is empty".into()));
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
