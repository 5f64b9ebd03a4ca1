//! Shared constants for label sheets
//!
//! Physical sizes are in centimeters unless the name says otherwise.
//! On-screen label proportions are in CSS pixels, before the raster
//! pixel ratio is applied.

// =============================================================================
// Unit Conversion
// =============================================================================

/// Points per millimeter (1 inch = 72 points, 1 inch = 25.4mm)
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Convert centimeters to millimeters
#[inline]
pub fn cm_to_mm(cm: f32) -> f32 {
    cm * 10.0
}

/// Convert centimeters to points
#[inline]
pub fn cm_to_pt(cm: f32) -> f32 {
    cm_to_mm(cm) * POINTS_PER_MM
}

// =============================================================================
// Output Page
// =============================================================================

/// ISO A4 width
pub const A4_WIDTH_CM: f32 = 21.0;

/// ISO A4 height
pub const A4_HEIGHT_CM: f32 = 29.7;

/// Most labels a single sheet may hold
pub const MAX_SLOTS_PER_PAGE: usize = 1024;

// =============================================================================
// Label Proportions
// =============================================================================

/// QR side as a fraction of label height
pub const QR_HEIGHT_RATIO: f32 = 0.9;

/// Vertical padding inside a label, also the QR/text spacing
pub const LABEL_PADDING_PX: f32 = 6.0;

/// Horizontal padding inside a label
pub const LABEL_PADDING_X_PX: f32 = 2.0;

/// Font size the scale factor is applied to
pub const BASE_FONT_SIZE_PX: f32 = 16.0;

/// Text column width that maps to a font scale of 1.0
pub const FONT_SCALE_WIDTH_PX: f32 = 80.0;

/// Text column height that maps to a font scale of 1.0
pub const FONT_SCALE_HEIGHT_PX: f32 = 50.0;

/// Line height multiplier for the item code
pub const CODE_LINE_HEIGHT: f32 = 1.1;

/// Destination font size relative to the base size
pub const DESTINATION_FONT_RATIO: f32 = 0.8;

/// Fragile badge font size relative to the base size
pub const BADGE_FONT_RATIO: f32 = 0.7;

/// Fragile badge icon size relative to the base size
pub const BADGE_ICON_RATIO: f32 = 0.8;

/// Right margin of the fragile badge
pub const BADGE_MARGIN_RIGHT_PX: f32 = 4.0;

/// Word printed in the fragile badge
pub const FRAGILE_TEXT: &str = "FRAGILE";

// =============================================================================
// Preview / Raster Defaults
// =============================================================================

/// Share of the available width used by the preview grid
pub const PREVIEW_WIDTH_RATIO: f32 = 0.9;

/// Gap between preview cells
pub const PREVIEW_GAP_PX: f32 = 4.0;

/// Default available width when no screen width is known
pub const DEFAULT_AVAILABLE_WIDTH_PX: f32 = 800.0;

/// Oversampling applied when rasterizing a label
pub const DEFAULT_PIXEL_RATIO: f32 = 2.0;

/// Lowest oversampling that keeps small label text legible in print
pub const MIN_PIXEL_RATIO: f32 = 2.0;

/// Upper bound for a single label rasterization
pub const DEFAULT_RASTER_TIMEOUT_MS: u64 = 5_000;

/// Labels rasterized at the same time
pub const DEFAULT_RASTER_CONCURRENCY: usize = 4;

// =============================================================================
// Colors
// =============================================================================

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Destination line color (#555)
pub const DESTINATION_GRAY: [u8; 4] = [0x55, 0x55, 0x55, 255];

/// Fragile badge text and border (red-900)
pub const BADGE_RED: [u8; 4] = [0x7f, 0x1d, 0x1d, 255];

/// Fragile badge fill (red-700 at 10% over white)
pub const BADGE_FILL: [u8; 4] = [0xf9, 0xe8, 0xe8, 255];
