//! Cloudinary client: signed upload, then fetch a delivery URL with a
//! face-aware fill crop plus improve/sharpen effects applied.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{ensure_success, RemoteApiError};

/// Path segment every Cloudinary delivery URL contains; transformations are
/// inserted right after it.
const UPLOAD_SEGMENT: &str = "/upload/";

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
    #[serde(default)]
    pub public_id: String,
}

/// HTTP client for the image host.
pub struct CloudinaryApi {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryApi {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self::with_client(reqwest::Client::new(), cloud_name, api_key, api_secret)
    }

    pub fn with_client(
        client: reqwest::Client,
        cloud_name: String,
        api_key: String,
        api_secret: String,
    ) -> Self {
        Self {
            client,
            cloud_name,
            api_key,
            api_secret,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        )
    }

    /// Upload image bytes with a signed request.
    pub async fn upload(&self, image: Vec<u8>) -> Result<UploadResponse, RemoteApiError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(&[("timestamp", timestamp.as_str())], &self.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(image).file_name("upload.png"))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| RemoteApiError::Decode(format!("upload response: {e}")))?;
        tracing::debug!(public_id = %uploaded.public_id, "Image uploaded to host");
        Ok(uploaded)
    }

    /// Download the bytes behind a delivery URL.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteApiError> {
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload `image`, then fetch it back transformed to `width` x `height`.
    pub async fn upload_transformed(
        &self,
        image: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RemoteApiError> {
        let uploaded = self.upload(image).await?;
        let url = transformed_url(&uploaded.secure_url, width, height)?;
        self.fetch(&url).await
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-256 hex digest.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let hash = Sha256::digest(format!("{joined}{api_secret}").as_bytes());
    format!("{hash:x}")
}

/// Insert the fill/face/improve/sharpen transformation into a delivery URL.
pub fn transformed_url(secure_url: &str, width: u32, height: u32) -> Result<String, RemoteApiError> {
    if !secure_url.contains(UPLOAD_SEGMENT) {
        return Err(RemoteApiError::Decode(format!(
            "delivery URL has no {UPLOAD_SEGMENT} segment: {secure_url}"
        )));
    }
    let transform = format!("c_fill,g_face,w_{width},h_{height},e_improve,e_sharpen");
    Ok(secure_url.replacen(UPLOAD_SEGMENT, &format!("{UPLOAD_SEGMENT}{transform}/"), 1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
