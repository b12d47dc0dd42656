//! HTTP clients for the remote services the photo pipeline delegates to.
//!
//! - [`background_removal`] -- foreground extraction (multipart upload,
//!   binary response).
//! - [`image_host`] -- signed upload to an image host plus a face-aware
//!   fill/improve transformation fetched back as bytes.
//! - [`enhancement`] -- face-aware upscaling with the image embedded as a
//!   base64 data URL in a JSON payload.
//!
//! Every call is a single request: no retry, no backoff.

pub mod background_removal;
pub mod enhancement;
pub mod error;
pub mod image_host;

pub use error::RemoteApiError;
