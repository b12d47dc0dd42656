//! Sheet layout value object.
//!
//! A [`LayoutConfig`] fixes everything the standardizer and compositor need
//! for one request: target photo box, border, copy count, and page geometry
//! (margins, inter-copy gap, row spacing). Defaults reproduce an A4 sheet at
//! 300 DPI holding 384x472 px photos.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::sheet::PlacementCursor;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default target photo width in pixels.
pub const DEFAULT_PHOTO_WIDTH: u32 = 384;

/// Default target photo height in pixels.
pub const DEFAULT_PHOTO_HEIGHT: u32 = 472;

/// Default border added on every side of the photo.
pub const DEFAULT_BORDER_PX: u32 = 2;

/// Default number of copies requested.
pub const DEFAULT_COPIES: u32 = 1;

/// Default vertical spacing between rows.
pub const DEFAULT_SPACING_PX: u32 = 60;

/// Default left margin (also the x a wrapped row restarts at).
pub const DEFAULT_MARGIN_X: u32 = 50;

/// Default top margin.
pub const DEFAULT_MARGIN_Y: u32 = 50;

/// Default horizontal gap between copies on one row.
pub const DEFAULT_HORIZONTAL_GAP: u32 = 10;

/// A4 width at 300 DPI.
pub const A4_WIDTH_300DPI: u32 = 2480;

/// A4 height at 300 DPI.
pub const A4_HEIGHT_300DPI: u32 = 3508;

// ---------------------------------------------------------------------------
// LayoutConfig
// ---------------------------------------------------------------------------

/// Immutable per-request layout parameters. All values are pixels except
/// `copies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub photo_width: u32,
    pub photo_height: u32,
    pub border_px: u32,
    pub copies: u32,
    pub spacing_px: u32,
    pub margin_x: u32,
    pub margin_y: u32,
    pub horizontal_gap: u32,
    pub page_width: u32,
    pub page_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            photo_width: DEFAULT_PHOTO_WIDTH,
            photo_height: DEFAULT_PHOTO_HEIGHT,
            border_px: DEFAULT_BORDER_PX,
            copies: DEFAULT_COPIES,
            spacing_px: DEFAULT_SPACING_PX,
            margin_x: DEFAULT_MARGIN_X,
            margin_y: DEFAULT_MARGIN_Y,
            horizontal_gap: DEFAULT_HORIZONTAL_GAP,
            page_width: A4_WIDTH_300DPI,
            page_height: A4_HEIGHT_300DPI,
        }
    }
}

impl LayoutConfig {
    /// Size of one standardized photo including its border on both sides.
    ///
    /// Saturates instead of overflowing so absurd request values degrade to
    /// "does not fit" rather than wrapping around.
    pub fn item_size(&self) -> (u32, u32) {
        let border = self.border_px.saturating_mul(2);
        (
            self.photo_width.saturating_add(border),
            self.photo_height.saturating_add(border),
        )
    }

    /// How many copies the packing algorithm can place on one page,
    /// independent of the requested `copies`.
    pub fn capacity(&self) -> u32 {
        let mut cursor = PlacementCursor::new(self, self.item_size());
        while cursor.next_slot().is_some() {}
        cursor.placed_count
    }

    /// Reject layouts that can never produce a photo.
    ///
    /// Width and height must be non-zero (a zero box cannot be resampled),
    /// at least one copy must be requested, and the bordered photo must fit
    /// inside the page once placed at the margin origin. There is no cap on
    /// `copies`: the compositor truncates at page capacity.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.photo_width == 0 || self.photo_height == 0 {
            return Err(CoreError::Validation(
                "Photo width and height must be greater than 0".to_string(),
            ));
        }
        if self.copies == 0 {
            return Err(CoreError::Validation(
                "Copies must be at least 1".to_string(),
            ));
        }
        if self.page_width == 0 || self.page_height == 0 {
            return Err(CoreError::Validation(
                "Page width and height must be greater than 0".to_string(),
            ));
        }

        let (item_w, item_h) = self.item_size();
        let right = u64::from(self.margin_x) + u64::from(item_w);
        let bottom = u64::from(self.margin_y) + u64::from(item_h);
        if right > u64::from(self.page_width) || bottom > u64::from(self.page_height) {
            return Err(CoreError::Validation(format!(
                "Bordered photo {item_w}x{item_h} does not fit on a {}x{} page with {}x{} margins",
                self.page_width, self.page_height, self.margin_x, self.margin_y
            )));
        }
        Ok(())
    }

    /// Copy of this layout with a different copy count.
    pub fn with_copies(self, copies: u32) -> Self {
        Self { copies, ..self }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
