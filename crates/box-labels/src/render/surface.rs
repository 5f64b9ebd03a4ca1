//! Renderable label surface
//!
//! A surface is a small display list in CSS pixels. The renderer builds it,
//! the rasterizer paints it; nothing else interprets it.

use crate::constants::{PREVIEW_GAP_PX, PREVIEW_WIDTH_RATIO};
use crate::layout::RectCm;
use crate::preset::LabelPreset;
use crate::types::{LabelError, Result};
use image::DynamicImage;
use std::sync::Arc;

/// On-screen size of one label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    /// Label size for a preview grid `available_width_px` wide.
    ///
    /// The grid uses 90% of the available width with a fixed gap between
    /// columns; height follows the preset's physical aspect ratio.
    pub fn for_preset(preset: &LabelPreset, available_width_px: f32) -> Result<Self> {
        Self::with_gap(preset, available_width_px, PREVIEW_GAP_PX)
    }

    pub fn with_gap(preset: &LabelPreset, available_width_px: f32, gap_px: f32) -> Result<Self> {
        preset.validate()?;
        let grid_width = available_width_px * PREVIEW_WIDTH_RATIO;
        let cols = preset.cols as f32;
        let width = (grid_width - gap_px * (cols - 1.0)) / cols;
        if !width.is_finite() || width <= 0.0 {
            return Err(LabelError::Config(format!(
                "available width {available_width_px}px is too small for {} columns",
                preset.cols
            )));
        }
        Ok(Self {
            width,
            height: width / preset.aspect_ratio(),
        })
    }
}

/// Rectangle in CSS pixels, origin at the label's top-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PxRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Centered fit of the given aspect ratio (object-fit: contain)
    pub fn contain(&self, aspect_ratio: f32) -> Self {
        let fitted = RectCm::new(self.x, self.y, self.width, self.height).contain(aspect_ratio);
        Self::new(fitted.x, fitted.y, fitted.width, fitted.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone)]
pub enum SurfaceElement {
    /// Image scaled into `rect` without distortion
    Image {
        rect: PxRect,
        image: Arc<DynamicImage>,
    },
    /// Single line of text, truncated with an ellipsis past `max_width`
    Text {
        x: f32,
        /// Top of the line box
        y: f32,
        max_width: f32,
        size: f32,
        weight: FontWeight,
        color: [u8; 4],
        text: String,
    },
    /// Warning pill anchored by its bottom-right corner
    Badge {
        right: f32,
        bottom: f32,
        font_size: f32,
        icon_size: f32,
        text: String,
    },
}

/// One label, ready to rasterize
#[derive(Debug, Clone)]
pub struct LabelSurface {
    /// Absolute slot index the label is destined for
    pub slot: usize,
    pub item_id: String,
    pub size: SurfaceSize,
    pub elements: Vec<SurfaceElement>,
}

impl LabelSurface {
    pub fn has_image(&self) -> bool {
        self.elements
            .iter()
            .any(|el| matches!(el, SurfaceElement::Image { .. }))
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|el| match el {
            SurfaceElement::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn has_badge(&self) -> bool {
        self.elements
            .iter()
            .any(|el| matches!(el, SurfaceElement::Badge { .. }))
    }
}
