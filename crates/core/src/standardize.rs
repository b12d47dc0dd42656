//! Photo standardizer: force the subject image into the target box and frame
//! it with a uniform border.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};

use crate::layout::LayoutConfig;

/// Border fill color.
pub const BORDER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Resize to exactly `photo_width x photo_height` (stretching, never
/// letterboxing) with Lanczos resampling, then pad `border_px` on all four
/// sides with [`BORDER_COLOR`].
///
/// The result is always `(photo_width + 2*border_px, photo_height + 2*border_px)`.
pub fn standardize_photo(subject: &RgbImage, layout: &LayoutConfig) -> RgbImage {
    let resized = if subject.dimensions() == (layout.photo_width, layout.photo_height) {
        subject.clone()
    } else {
        imageops::resize(
            subject,
            layout.photo_width,
            layout.photo_height,
            FilterType::Lanczos3,
        )
    };

    add_border(&resized, layout.border_px, BORDER_COLOR)
}

/// Expand the canvas by `border` pixels on every side.
pub fn add_border(photo: &RgbImage, border: u32, color: Rgb<u8>) -> RgbImage {
    if border == 0 {
        return photo.clone();
    }
    let (width, height) = photo.dimensions();
    let mut framed = RgbImage::from_pixel(width + 2 * border, height + 2 * border, color);
    imageops::replace(&mut framed, photo, i64::from(border), i64::from(border));
    framed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
