//! Client for a remove.bg-compatible foreground extraction endpoint.

use reqwest::multipart::{Form, Part};

use crate::error::{ensure_success, RemoteApiError};

/// Default remove.bg endpoint.
pub const DEFAULT_REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";

/// Size hint sent with every request: let the service pick the largest
/// output the account allows.
pub const SIZE_HINT: &str = "auto";

/// HTTP client for the background removal service.
pub struct RemoveBgApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl RemoveBgApi {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    /// Upload the raw image and return the response body, which is the
    /// subject on a transparent background (PNG).
    pub async fn remove_background(&self, image: Vec<u8>) -> Result<Vec<u8>, RemoteApiError> {
        let form = build_form(image);

        let response = self
            .client
            .post(&self.api_url)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(size = bytes.len(), "Background removal returned image");
        Ok(bytes.to_vec())
    }
}

/// Multipart body: the image under `image_file` plus the size hint.
fn build_form(image: Vec<u8>) -> Form {
    Form::new()
        .part("image_file", Part::bytes(image).file_name("upload"))
        .text("size", SIZE_HINT)
}
