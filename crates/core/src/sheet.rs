//! Sheet compositor: row-major grid packing of identical photos onto a
//! fixed-size page.
//!
//! Packing is single-pass with early truncation. A copy that would run past
//! the right page edge wraps to a new row; a row that would run past the
//! bottom edge ends composition, and any remaining copies are dropped. Fewer
//! copies than requested is a capacity limit, never an error.

use image::{imageops, Rgb, RgbImage};

use crate::layout::LayoutConfig;

/// Solid background of a fresh page canvas.
pub const PAGE_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

// ---------------------------------------------------------------------------
// PlacementCursor
// ---------------------------------------------------------------------------

/// Packing state for one composition.
///
/// `y` never decreases, and every slot handed out lies fully inside the
/// page. Coordinates are kept in `u64` so large margins or gaps cannot
/// overflow.
#[derive(Debug, Clone)]
pub struct PlacementCursor {
    pub x: u64,
    pub y: u64,
    pub placed_count: u32,
    item_width: u64,
    item_height: u64,
    margin_x: u64,
    spacing: u64,
    gap: u64,
    page_width: u64,
    page_height: u64,
}

impl PlacementCursor {
    /// Start at `(margin_x, margin_y)` for items of the given size.
    pub fn new(layout: &LayoutConfig, (item_width, item_height): (u32, u32)) -> Self {
        Self {
            x: u64::from(layout.margin_x),
            y: u64::from(layout.margin_y),
            placed_count: 0,
            item_width: u64::from(item_width),
            item_height: u64::from(item_height),
            margin_x: u64::from(layout.margin_x),
            spacing: u64::from(layout.spacing_px),
            gap: u64::from(layout.horizontal_gap),
            page_width: u64::from(layout.page_width),
            page_height: u64::from(layout.page_height),
        }
    }

    /// Claim the next slot, returning its top-left corner, or `None` once
    /// the page is full.
    pub fn next_slot(&mut self) -> Option<(u32, u32)> {
        if self.item_width == 0 || self.item_height == 0 {
            return None;
        }

        if self.x + self.item_width > self.page_width {
            self.x = self.margin_x;
            self.y += self.item_height + self.spacing;
        }
        if self.y + self.item_height > self.page_height {
            return None;
        }
        // Too wide even at the start of a row. `LayoutConfig::validate`
        // rejects such layouts; this keeps unvalidated callers inside the
        // page instead of pasting clipped copies on every row.
        if self.x + self.item_width > self.page_width {
            return None;
        }

        // Both coordinates are bounded by the page dimensions here.
        let slot = (self.x as u32, self.y as u32);
        self.x += self.item_width + self.gap;
        self.placed_count += 1;
        Some(slot)
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// A composed page plus where each copy landed.
#[derive(Debug, Clone)]
pub struct ComposedSheet {
    pub canvas: RgbImage,
    pub placements: Vec<(u32, u32)>,
}

impl ComposedSheet {
    /// Number of copies actually placed (at most the requested count).
    pub fn placed_count(&self) -> u32 {
        self.placements.len() as u32
    }
}

/// Compute slot positions for `layout.copies` items of `item_size`
/// without touching any pixels.
pub fn plan_placements(layout: &LayoutConfig, item_size: (u32, u32)) -> Vec<(u32, u32)> {
    let mut cursor = PlacementCursor::new(layout, item_size);
    let mut placements = Vec::new();
    for _ in 0..layout.copies {
        match cursor.next_slot() {
            Some(slot) => placements.push(slot),
            None => break,
        }
    }
    placements
}

/// Pack `layout.copies` copies of `photo` onto a fresh white page.
///
/// The photo's own dimensions are the item size, so a standardized photo
/// (`photo + 2 * border` on each axis) packs exactly as
/// [`LayoutConfig::capacity`] predicts.
pub fn compose_sheet(photo: &RgbImage, layout: &LayoutConfig) -> ComposedSheet {
    let mut canvas = RgbImage::from_pixel(layout.page_width, layout.page_height, PAGE_BACKGROUND);
    let placements = plan_placements(layout, photo.dimensions());

    for &(x, y) in &placements {
        imageops::replace(&mut canvas, photo, i64::from(x), i64::from(y));
    }

    tracing::debug!(
        requested = layout.copies,
        placed = placements.len(),
        "Composed photo sheet"
    );

    ComposedSheet { canvas, placements }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
