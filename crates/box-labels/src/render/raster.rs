//! Rasterizer: label surface -> bitmap
//!
//! Paints a [`LabelSurface`] onto a white RGBA canvas at `pixel_ratio`
//! device pixels per CSS pixel.

use crate::constants::{BADGE_FILL, BADGE_RED, WHITE};
use crate::types::{LabelError, Result};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::io::Cursor;
use std::sync::Arc;

use super::{FontWeight, LabelSurface, PxRect, SurfaceElement, TextFace};

/// A rasterized label, tagged with the slot it belongs to
#[derive(Debug, Clone)]
pub struct LabelBitmap {
    pub slot: usize,
    pub item_id: String,
    pub image: RgbaImage,
}

impl LabelBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.image.width() as f32 / self.image.height().max(1) as f32
    }

    /// PNG encoding of the bitmap
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    /// RGB pixels for embedding; the canvas is opaque so alpha is dropped.
    pub fn to_rgb(&self) -> image::RgbImage {
        image::DynamicImage::ImageRgba8(self.image.clone()).to_rgb8()
    }
}

/// Turns a surface into pixels. Must be usable from blocking worker threads.
pub trait Rasterize: Send + Sync {
    fn rasterize(&self, surface: &LabelSurface) -> Result<LabelBitmap>;
}

/// Default rasterizer backed by `image`/`imageproc`
#[derive(Debug, Clone)]
pub struct SurfaceRasterizer {
    face: Arc<TextFace>,
    pixel_ratio: f32,
}

impl Default for SurfaceRasterizer {
    fn default() -> Self {
        Self::new(Arc::new(TextFace::Bitmap), crate::constants::DEFAULT_PIXEL_RATIO)
    }
}

impl SurfaceRasterizer {
    pub fn new(face: Arc<TextFace>, pixel_ratio: f32) -> Self {
        Self { face, pixel_ratio }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn paint(&self, surface: &LabelSurface) -> std::result::Result<RgbaImage, String> {
        let ratio = self.pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(format!("pixel ratio must be positive, got {ratio}"));
        }
        let width = (surface.size.width * ratio).round();
        let height = (surface.size.height * ratio).round();
        if !(width >= 1.0 && height >= 1.0) {
            return Err(format!(
                "surface {}x{} has no pixels",
                surface.size.width, surface.size.height
            ));
        }

        let mut canvas = RgbaImage::from_pixel(width as u32, height as u32, Rgba(WHITE));
        for element in &surface.elements {
            match element {
                SurfaceElement::Image { rect, image } => {
                    draw_image(&mut canvas, rect.scaled(ratio), image)?;
                }
                SurfaceElement::Text {
                    x,
                    y,
                    max_width,
                    size,
                    weight,
                    color,
                    text,
                } => {
                    let size = size * ratio;
                    let fitted = self.face.fit(text, size, max_width * ratio);
                    self.face.draw(
                        &mut canvas,
                        x * ratio,
                        y * ratio,
                        size,
                        *color,
                        *weight == FontWeight::Bold,
                        &fitted,
                    );
                }
                SurfaceElement::Badge {
                    right,
                    bottom,
                    font_size,
                    icon_size,
                    text,
                } => self.draw_badge(
                    &mut canvas,
                    right * ratio,
                    bottom * ratio,
                    font_size * ratio,
                    icon_size * ratio,
                    text,
                ),
            }
        }
        Ok(canvas)
    }

    fn draw_badge(
        &self,
        canvas: &mut RgbaImage,
        right: f32,
        bottom: f32,
        font_size: f32,
        icon_size: f32,
        text: &str,
    ) {
        let pad_x = font_size * 0.4;
        let pad_y = font_size * 0.15;
        let gap = font_size * 0.25;
        let text_width = self.face.measure(text, font_size);
        let inner_height = icon_size.max(font_size);
        let width = pad_x * 2.0 + icon_size + gap + text_width;
        let height = inner_height + pad_y * 2.0;
        let left = right - width;
        let top = bottom - height;

        let (w, h) = (width.round() as u32, height.round() as u32);
        if w < 4 || h < 4 {
            return;
        }
        let (x, y) = (left.round() as i32, top.round() as i32);
        let border = (font_size / 12.0).round().max(1.0) as u32;
        fill_pill(canvas, x, y, w, h, Rgba(BADGE_RED));
        fill_pill(
            canvas,
            x + border as i32,
            y + border as i32,
            w.saturating_sub(border * 2),
            h.saturating_sub(border * 2),
            Rgba(BADGE_FILL),
        );

        let icon_left = left + pad_x;
        let icon_top = top + (height - icon_size) / 2.0;
        draw_warning_icon(canvas, icon_left, icon_top, icon_size);

        let text_top = top + (height - font_size) / 2.0;
        self.face.draw(
            canvas,
            icon_left + icon_size + gap,
            text_top,
            font_size,
            BADGE_RED,
            true,
            text,
        );
    }
}

impl Rasterize for SurfaceRasterizer {
    fn rasterize(&self, surface: &LabelSurface) -> Result<LabelBitmap> {
        let image = self
            .paint(surface)
            .map_err(|reason| LabelError::RasterizeFailed {
                slot: surface.slot,
                reason,
            })?;
        Ok(LabelBitmap {
            slot: surface.slot,
            item_id: surface.item_id.clone(),
            image,
        })
    }
}

/// Scale `image` into `rect` keeping its aspect ratio, centered.
fn draw_image(
    canvas: &mut RgbaImage,
    rect: PxRect,
    image: &image::DynamicImage,
) -> std::result::Result<(), String> {
    if image.width() == 0 || image.height() == 0 {
        return Err("embedded image is empty".to_string());
    }
    let aspect = image.width() as f32 / image.height() as f32;
    let fitted = rect.contain(aspect);
    let (w, h) = (fitted.width.round() as u32, fitted.height.round() as u32);
    if w == 0 || h == 0 {
        return Ok(());
    }
    // QR modules must stay crisp
    let scaled = imageops::resize(&image.to_rgba8(), w, h, FilterType::Nearest);
    imageops::overlay(
        canvas,
        &scaled,
        fitted.x.round() as i64,
        fitted.y.round() as i64,
    );
    Ok(())
}

/// Rectangle with fully rounded ends
fn fill_pill(
    canvas: &mut RgbaImage,
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    color: Rgba<u8>,
) {
    if width == 0 || height == 0 {
        return;
    }
    let radius = (height / 2) as i32;
    let center_y = top + radius;
    if width <= height {
        draw_filled_circle_mut(canvas, (left + width as i32 / 2, center_y), radius, color);
        return;
    }
    let body = Rect::at(left + radius, top).of_size(width - 2 * radius as u32, height);
    draw_filled_rect_mut(canvas, body, color);
    draw_filled_circle_mut(canvas, (left + radius, center_y), radius, color);
    draw_filled_circle_mut(canvas, (left + width as i32 - 1 - radius, center_y), radius, color);
}

fn draw_warning_icon(canvas: &mut RgbaImage, left: f32, top: f32, size: f32) {
    if size < 3.0 {
        return;
    }
    let l = left.round() as i32;
    let t = top.round() as i32;
    let s = size.round() as i32;
    let triangle = [
        Point::new(l, t + s),
        Point::new(l + s / 2, t),
        Point::new(l + s, t + s),
    ];
    draw_polygon_mut(canvas, &triangle, Rgba(BADGE_RED));

    let cx = left + size / 2.0;
    let white = Rgba(WHITE);
    draw_line_segment_mut(
        canvas,
        (cx, top + size * 0.4),
        (cx, top + size * 0.72),
        white,
    );
    draw_line_segment_mut(
        canvas,
        (cx, top + size * 0.82),
        (cx, top + size * 0.86),
        white,
    );
}
