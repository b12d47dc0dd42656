//! Page exporter: serialize a composed canvas into a downloadable document.
//!
//! - [`ExportFormat::Pdf`] -- single-page PDF whose MediaBox is derived from
//!   the pixel size and DPI (2480x3508 px at 300 DPI is A4), with the canvas
//!   embedded as a JPEG image XObject.
//! - [`ExportFormat::Png`] -- lossless raster.
//! - [`ExportFormat::Jpeg`] -- raster carrying a JFIF pixel density.

use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::{ImageFormat, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Density the default page geometry was computed for.
pub const DEFAULT_DPI: u32 = 300;

/// JPEG quality used for raster JPEG output and the PDF image stream.
pub const JPEG_QUALITY: u8 = 95;

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Base name of every exported download.
const FILE_STEM: &str = "passport-sheet";

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(CoreError::Validation(format!(
                "Unknown export format '{other}'. Must be one of: pdf, png, jpeg"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Serialized page ready to stream back to the client.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
}

impl ExportedDocument {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Attachment filename, e.g. `passport-sheet.pdf`.
    pub fn file_name(&self) -> String {
        format!("{FILE_STEM}.{}", self.format.extension())
    }
}

/// Serialize `canvas` in `format`, embedding `dpi` where the format allows.
pub fn export_page(
    canvas: &RgbImage,
    format: ExportFormat,
    dpi: u32,
) -> Result<ExportedDocument, CoreError> {
    if dpi == 0 {
        return Err(CoreError::Validation("DPI must be greater than 0".into()));
    }

    let bytes = match format {
        ExportFormat::Pdf => encode_pdf(canvas, dpi)?,
        ExportFormat::Png => encode_png(canvas)?,
        ExportFormat::Jpeg => encode_jpeg(canvas, dpi)?,
    };

    tracing::debug!(format = ?format, dpi, size = bytes.len(), "Exported page");
    Ok(ExportedDocument { bytes, format })
}

/// Page size in PDF points for a pixel canvas rendered at `dpi`.
pub fn page_size_points(width_px: u32, height_px: u32, dpi: u32) -> (f32, f32) {
    let scale = POINTS_PER_INCH / dpi as f32;
    (width_px as f32 * scale, height_px as f32 * scale)
}

fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>, CoreError> {
    let mut bytes = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn encode_jpeg(canvas: &RgbImage, dpi: u32) -> Result<Vec<u8>, CoreError> {
    let density = u16::try_from(dpi)
        .map_err(|_| CoreError::Validation(format!("DPI {dpi} is too large for JPEG")))?;

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder.set_pixel_density(PixelDensity::dpi(density));
    encoder.encode_image(canvas)?;
    Ok(bytes)
}

fn encode_pdf(canvas: &RgbImage, dpi: u32) -> Result<Vec<u8>, CoreError> {
    let (width_px, height_px) = canvas.dimensions();
    let (width_pt, height_pt) = page_size_points(width_px, height_px, dpi);
    let jpeg = encode_jpeg(canvas, dpi)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width_px),
            "Height" => i64::from(height_px),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    // Scale the unit image square to the full page.
    let content = format!("q\n{width_pt:.2} 0 0 {height_pt:.2} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width_pt),
            Object::Real(height_pt),
        ],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| CoreError::Export(format!("Failed to write PDF: {e}")))?;
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
