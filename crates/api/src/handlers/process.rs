//! Handler for the photo sheet upload.
//!
//! Accepts a multipart form with an `image` file field and optional numeric
//! fields `photo_width`, `photo_height`, `border`, `copies` and `spacing`,
//! plus an optional `format` (`pdf`, `png`, `jpeg`). Absent or blank fields
//! fall back to the server's layout and export defaults.

use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use photosheet_core::export::ExportFormat;
use photosheet_core::layout::LayoutConfig;

use crate::error::{AppError, AppResult};
use crate::middleware::admission::Admitted;
use crate::state::AppState;

/// Response header carrying how many copies fit on the sheet.
pub const PLACED_COPIES_HEADER: HeaderName = HeaderName::from_static("x-placed-copies");

/// Parsed upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<Vec<u8>>,
    pub photo_width: Option<u32>,
    pub photo_height: Option<u32>,
    pub border: Option<u32>,
    pub copies: Option<u32>,
    pub spacing: Option<u32>,
    pub format: Option<ExportFormat>,
}

impl UploadForm {
    /// Apply the form's overrides on top of the server defaults.
    pub fn layout(&self, defaults: &LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            photo_width: self.photo_width.unwrap_or(defaults.photo_width),
            photo_height: self.photo_height.unwrap_or(defaults.photo_height),
            border_px: self.border.unwrap_or(defaults.border_px),
            copies: self.copies.unwrap_or(defaults.copies),
            spacing_px: self.spacing.unwrap_or(defaults.spacing_px),
            ..*defaults
        }
    }
}

/// POST /api/v1/process
///
/// Runs the uploaded photo through the pipeline and returns the sheet as a
/// download. Admission is checked before the body is read.
pub async fn process_photo(
    admitted: Admitted,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = read_upload_form(multipart).await?;

    let image = form.image.take().ok_or(AppError::MissingInput)?;
    let layout = form.layout(&state.config.layout);
    layout.validate()?;
    let format = form.format.unwrap_or(state.config.export.format);

    tracing::info!(
        client = %admitted.client_key,
        admission = ?admitted.admission,
        upload_bytes = image.len(),
        copies = layout.copies,
        "Processing photo sheet"
    );

    let output = state
        .pipeline
        .run(image, layout, format, state.config.export.dpi)
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", output.document.file_name());
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, output.document.content_type().to_string()),
            (CONTENT_DISPOSITION, disposition),
            (PLACED_COPIES_HEADER, output.placed_count.to_string()),
        ],
        output.document.bytes,
    )
        .into_response())
}

/// Drain the multipart stream into an [`UploadForm`]. Unknown fields are
/// ignored; an empty file field counts as no image.
async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !data.is_empty() {
                    form.image = Some(data.to_vec());
                }
            }
            "photo_width" | "photo_height" | "border" | "copies" | "spacing" | "format" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                apply_text_field(&mut form, &name, &text)?;
            }
            _ => {}
        }
    }

    Ok(form)
}

fn apply_text_field(form: &mut UploadForm, name: &str, raw: &str) -> AppResult<()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }

    match name {
        "format" => form.format = Some(raw.parse()?),
        "photo_width" => form.photo_width = Some(parse_u32(name, raw)?),
        "photo_height" => form.photo_height = Some(parse_u32(name, raw)?),
        "border" => form.border = Some(parse_u32(name, raw)?),
        "copies" => form.copies = Some(parse_u32(name, raw)?),
        "spacing" => form.spacing = Some(parse_u32(name, raw)?),
        _ => {}
    }
    Ok(())
}

fn parse_u32(name: &str, raw: &str) -> AppResult<u32> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("{name} must be a non-negative integer")))
}
