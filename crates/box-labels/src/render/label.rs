//! Label renderer: item record -> label surface

use crate::constants::*;
use crate::types::PrintableItem;
use image::DynamicImage;
use std::sync::Arc;

use super::{FontWeight, LabelSurface, PxRect, SurfaceElement, SurfaceSize};

/// Internal proportions of a label of a given size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelMetrics {
    pub qr_side: f32,
    pub padding: f32,
    pub padding_x: f32,
    pub content_width: f32,
    pub content_height: f32,
    /// Text scale relative to the 16px base size, never negative
    pub font_scale: f32,
}

impl LabelMetrics {
    pub fn compute(size: SurfaceSize) -> Self {
        let qr_side = size.height * QR_HEIGHT_RATIO;
        let padding = LABEL_PADDING_PX;
        let content_width = size.width - qr_side - padding * 2.0;
        let content_height = size.height - padding * 2.0;
        let font_scale = (content_width / FONT_SCALE_WIDTH_PX)
            .min(content_height / FONT_SCALE_HEIGHT_PX)
            .max(0.0);

        Self {
            qr_side,
            padding,
            padding_x: LABEL_PADDING_X_PX,
            content_width,
            content_height,
            font_scale,
        }
    }

    pub fn code_size(&self) -> f32 {
        BASE_FONT_SIZE_PX * self.font_scale
    }

    pub fn destination_size(&self) -> f32 {
        BASE_FONT_SIZE_PX * DESTINATION_FONT_RATIO * self.font_scale
    }

    pub fn badge_font_size(&self) -> f32 {
        BASE_FONT_SIZE_PX * BADGE_FONT_RATIO * self.font_scale
    }

    pub fn badge_icon_size(&self) -> f32 {
        BASE_FONT_SIZE_PX * BADGE_ICON_RATIO * self.font_scale
    }
}

/// Build the surface for one item.
///
/// A missing QR image yields a text-only label; an empty destination yields
/// the item code alone. Never fails.
pub fn render_label(
    slot: usize,
    item: &PrintableItem,
    qr: Option<Arc<DynamicImage>>,
    size: SurfaceSize,
) -> LabelSurface {
    let metrics = LabelMetrics::compute(size);
    let mut elements = Vec::new();

    let mut text_x = metrics.padding_x;
    if let Some(image) = qr {
        elements.push(SurfaceElement::Image {
            rect: PxRect::new(
                metrics.padding_x,
                (size.height - metrics.qr_side) / 2.0,
                metrics.qr_side,
                metrics.qr_side,
            ),
            image,
        });
        text_x += metrics.qr_side + metrics.padding;
    }

    if metrics.font_scale > 0.0 && metrics.content_width > 0.0 {
        let top = metrics.padding;
        elements.push(SurfaceElement::Text {
            x: text_x,
            y: top,
            max_width: metrics.content_width,
            size: metrics.code_size(),
            weight: FontWeight::Bold,
            color: BLACK,
            text: item.display_code.clone(),
        });

        let destination = item.destination_label.trim();
        if !destination.is_empty() {
            elements.push(SurfaceElement::Text {
                x: text_x,
                y: top + metrics.code_size() * CODE_LINE_HEIGHT,
                max_width: metrics.content_width,
                size: metrics.destination_size(),
                weight: FontWeight::Regular,
                color: DESTINATION_GRAY,
                text: destination.to_string(),
            });
        }

        if item.is_fragile {
            elements.push(SurfaceElement::Badge {
                right: text_x + metrics.content_width - BADGE_MARGIN_RIGHT_PX,
                bottom: size.height - metrics.padding,
                font_size: metrics.badge_font_size(),
                icon_size: metrics.badge_icon_size(),
                text: FRAGILE_TEXT.to_string(),
            });
        }
    } else {
        log::debug!(
            "Label for {} too small for text ({:.1}x{:.1}px)",
            item.id,
            size.width,
            size.height
        );
    }

    LabelSurface {
        slot,
        item_id: item.id.clone(),
        size,
        elements,
    }
}
