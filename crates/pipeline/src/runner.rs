//! Ordered pipeline orchestrator.
//!
//! ```text
//! decode upload -> background removal -> normalize -> image hosting
//!   -> enhancement -> normalize -> standardize -> compose -> export
//! ```
//!
//! Remote stages are optional; a disabled stage passes the working image
//! through. The first [`StageFailure`] ends the run, so nothing downstream of
//! a failed stage (in particular the compositor) ever executes. Decoding,
//! resampling, packing and encoding run on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use photosheet_core::export::{ExportFormat, ExportedDocument};
use photosheet_core::layout::LayoutConfig;
use photosheet_core::normalize::into_rgb;
use photosheet_core::standardize::standardize_photo;

use crate::error::{ProcessingResult, Stage, StageFailure};
use crate::stages::{
    BackgroundRemover, Compositor, Enhancer, Exporter, GridCompositor, ImageStore, PageExporter,
};

/// Finished sheet plus how many copies actually fit.
#[derive(Debug, Clone)]
pub struct SheetOutput {
    pub document: ExportedDocument,
    pub placed_count: u32,
}

#[derive(Clone)]
pub struct Pipeline {
    background_remover: Option<Arc<dyn BackgroundRemover>>,
    image_store: Option<Arc<dyn ImageStore>>,
    enhancer: Option<Arc<dyn Enhancer>>,
    compositor: Arc<dyn Compositor>,
    exporter: Arc<dyn Exporter>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Local-only pipeline: every remote stage disabled.
    pub fn new() -> Self {
        Self {
            background_remover: None,
            image_store: None,
            enhancer: None,
            compositor: Arc::new(GridCompositor),
            exporter: Arc::new(PageExporter),
        }
    }

    pub fn with_background_remover(mut self, stage: Arc<dyn BackgroundRemover>) -> Self {
        self.background_remover = Some(stage);
        self
    }

    pub fn with_image_store(mut self, stage: Arc<dyn ImageStore>) -> Self {
        self.image_store = Some(stage);
        self
    }

    pub fn with_enhancer(mut self, stage: Arc<dyn Enhancer>) -> Self {
        self.enhancer = Some(stage);
        self
    }

    pub fn with_compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Remote stages that will run, in execution order.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if self.background_remover.is_some() {
            stages.push(Stage::BackgroundRemoval);
        }
        if self.image_store.is_some() {
            stages.push(Stage::ImageHosting);
        }
        if self.enhancer.is_some() {
            stages.push(Stage::Enhancement);
        }
        stages
    }

    /// Turn one uploaded image into an exported sheet.
    ///
    /// `layout` is expected to have passed [`LayoutConfig::validate`].
    pub async fn run(
        &self,
        upload: Vec<u8>,
        layout: LayoutConfig,
        format: ExportFormat,
        dpi: u32,
    ) -> ProcessingResult<SheetOutput> {
        let started = Instant::now();

        // The upload is decoded even when background removal will replace it,
        // so a non-image never reaches a remote service.
        let (mut working, upload) = blocking(Stage::Decode, move || {
            decode_image(Stage::Decode, &upload).map(|image| (image, upload))
        })
        .await
        .inspect_err(log_failure)?;

        if let Some(remover) = &self.background_remover {
            tracing::debug!(stage = %Stage::BackgroundRemoval, "Stage started");
            let cutout = remover
                .remove_background(upload)
                .await
                .inspect_err(log_failure)?;
            working = blocking(Stage::BackgroundRemoval, move || {
                decode_image(Stage::BackgroundRemoval, &cutout)
            })
            .await
            .inspect_err(log_failure)?;
            tracing::debug!(stage = %Stage::BackgroundRemoval, "Stage finished");
        }

        if let Some(store) = &self.image_store {
            tracing::debug!(stage = %Stage::ImageHosting, "Stage started");
            let png = blocking(Stage::ImageHosting, move || {
                encode_png(Stage::ImageHosting, &working)
            })
            .await
            .inspect_err(log_failure)?;
            let hosted = store
                .store_and_transform(png, layout.photo_width, layout.photo_height)
                .await
                .inspect_err(log_failure)?;
            working = blocking(Stage::ImageHosting, move || {
                decode_image(Stage::ImageHosting, &hosted)
            })
            .await
            .inspect_err(log_failure)?;
            tracing::debug!(stage = %Stage::ImageHosting, "Stage finished");
        }

        if let Some(enhancer) = &self.enhancer {
            tracing::debug!(stage = %Stage::Enhancement, "Stage started");
            let png = blocking(Stage::Enhancement, move || {
                encode_png(Stage::Enhancement, &working)
            })
            .await
            .inspect_err(log_failure)?;
            let enhanced = enhancer.enhance(png).await.inspect_err(log_failure)?;
            working = blocking(Stage::EnhancementDecode, move || {
                decode_image(Stage::EnhancementDecode, &enhanced)
            })
            .await
            .inspect_err(log_failure)?;
            tracing::debug!(stage = %Stage::Enhancement, "Stage finished");
        }

        let photo = blocking(Stage::Standardize, move || {
            Ok(standardize_photo(&working, &layout))
        })
        .await
        .inspect_err(log_failure)?;

        let compositor = Arc::clone(&self.compositor);
        let sheet = blocking(Stage::Compose, move || Ok(compositor.compose(&photo, &layout)))
            .await
            .inspect_err(log_failure)?;
        let placed_count = sheet.placed_count();

        let exporter = Arc::clone(&self.exporter);
        let document = blocking(Stage::Export, move || {
            exporter
                .export(&sheet.canvas, format, dpi)
                .map_err(|e| StageFailure::new(Stage::Export, e.to_string()))
        })
        .await
        .inspect_err(log_failure)?;

        tracing::info!(
            requested = layout.copies,
            placed = placed_count,
            format = ?format,
            bytes = document.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sheet produced"
        );

        Ok(SheetOutput {
            document,
            placed_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run CPU-bound work on the blocking pool, attributing a lost task to
/// `stage`.
async fn blocking<T, F>(stage: Stage, work: F) -> ProcessingResult<T>
where
    F: FnOnce() -> ProcessingResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StageFailure::new(stage, format!("worker task failed: {e}")))?
}

fn decode_image(stage: Stage, bytes: &[u8]) -> ProcessingResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(into_rgb)
        .map_err(|e| StageFailure::new(stage, format!("could not decode image: {e}")))
}

fn encode_png(stage: Stage, image: &RgbImage) -> ProcessingResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| StageFailure::new(stage, format!("could not encode PNG: {e}")))?;
    Ok(bytes)
}

fn log_failure(failure: &StageFailure) {
    tracing::warn!(
        stage = %failure.stage,
        upstream_status = ?failure.upstream_status,
        error = %failure.message,
        "Pipeline stage failed"
    );
}
