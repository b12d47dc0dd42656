//! Pluggable stage interfaces and their production implementations.
//!
//! Remote stages are async traits so tests can stub them without a network;
//! the CPU-bound compositor and exporter are plain traits the orchestrator
//! runs on the blocking pool.

use async_trait::async_trait;
use image::RgbImage;
use photosheet_core::error::CoreError;
use photosheet_core::export::{export_page, ExportFormat, ExportedDocument};
use photosheet_core::layout::LayoutConfig;
use photosheet_core::sheet::{compose_sheet, ComposedSheet};
use photosheet_remote::background_removal::RemoveBgApi;
use photosheet_remote::enhancement::EnhanceApi;
use photosheet_remote::image_host::CloudinaryApi;
use photosheet_remote::RemoteApiError;

use crate::error::{ProcessingResult, Stage, StageFailure};

// ---------------------------------------------------------------------------
// Stage traits
// ---------------------------------------------------------------------------

/// Extracts the subject from raw upload bytes. Output is an encoded image,
/// normally with a transparent background.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(&self, image: Vec<u8>) -> ProcessingResult<Vec<u8>>;
}

/// Intermediate image host that returns the stored image cropped to
/// `width` x `height` around the face.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store_and_transform(
        &self,
        png: Vec<u8>,
        width: u32,
        height: u32,
    ) -> ProcessingResult<Vec<u8>>;
}

/// Face-aware upscaling of a PNG-encoded image.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(&self, png: Vec<u8>) -> ProcessingResult<Vec<u8>>;
}

/// Places standardized photos onto a page canvas.
pub trait Compositor: Send + Sync {
    fn compose(&self, photo: &RgbImage, layout: &LayoutConfig) -> ComposedSheet;
}

/// Serializes a page canvas.
pub trait Exporter: Send + Sync {
    fn export(
        &self,
        canvas: &RgbImage,
        format: ExportFormat,
        dpi: u32,
    ) -> Result<ExportedDocument, CoreError>;
}

// ---------------------------------------------------------------------------
// Local implementations
// ---------------------------------------------------------------------------

/// Row-major grid packing with early truncation.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridCompositor;

impl Compositor for GridCompositor {
    fn compose(&self, photo: &RgbImage, layout: &LayoutConfig) -> ComposedSheet {
        compose_sheet(photo, layout)
    }
}

/// PDF / PNG / JPEG exporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageExporter;

impl Exporter for PageExporter {
    fn export(
        &self,
        canvas: &RgbImage,
        format: ExportFormat,
        dpi: u32,
    ) -> Result<ExportedDocument, CoreError> {
        export_page(canvas, format, dpi)
    }
}

// ---------------------------------------------------------------------------
// Remote adapters
// ---------------------------------------------------------------------------

#[async_trait]
impl BackgroundRemover for RemoveBgApi {
    async fn remove_background(&self, image: Vec<u8>) -> ProcessingResult<Vec<u8>> {
        RemoveBgApi::remove_background(self, image)
            .await
            .map_err(|e| StageFailure::from_remote(Stage::BackgroundRemoval, e))
    }
}

#[async_trait]
impl ImageStore for CloudinaryApi {
    async fn store_and_transform(
        &self,
        png: Vec<u8>,
        width: u32,
        height: u32,
    ) -> ProcessingResult<Vec<u8>> {
        self.upload_transformed(png, width, height)
            .await
            .map_err(|e| StageFailure::from_remote(Stage::ImageHosting, e))
    }
}

#[async_trait]
impl Enhancer for EnhanceApi {
    async fn enhance(&self, png: Vec<u8>) -> ProcessingResult<Vec<u8>> {
        EnhanceApi::enhance(self, &png).await.map_err(|e| match e {
            RemoteApiError::Decode(_) => StageFailure::from_remote(Stage::EnhancementDecode, e),
            other => StageFailure::from_remote(Stage::Enhancement, other),
        })
    }
}
