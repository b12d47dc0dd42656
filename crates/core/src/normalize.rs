//! Flatten any decoded image to opaque RGB on a white backing.
//!
//! Runs after every stage that can introduce transparency (background
//! removal, remote enhancement).

use image::{DynamicImage, Rgb, RgbImage};

/// Backing color that shows through transparent pixels.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Convert `image` to an 8-bit RGB buffer with no alpha channel.
///
/// Images that carry alpha (RGBA, luminance-alpha, at any bit depth) are
/// composited over solid white using alpha as the blend mask; everything else
/// is a straight color conversion. Normalizing an RGB8 image returns an
/// identical buffer.
pub fn normalize_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::from_pixel(width, height, WHITE);

    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
    }
    out
}

/// Owned variant for callers that hold a `DynamicImage` by value.
pub fn into_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => normalize_to_rgb(&other),
    }
}

/// Blend one channel over white: `c * a + 255 * (1 - a)`, rounded.
fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    let blended = c * a + 255 * (255 - a);
    ((blended + 127) / 255) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
