//! Text faces used when painting labels
//!
//! `Outline` draws with a TrueType font through rusttype. `Bitmap` is a
//! built-in 5x7 face so labels still carry readable codes when no font file
//! is configured.

use crate::types::{LabelError, Result};
use image::{Rgba, RgbaImage};
use rusttype::{Font, Scale, point};
use std::path::Path;

const ELLIPSIS: &str = "...";

#[derive(Default)]
pub enum TextFace {
    Outline(Font<'static>),
    #[default]
    Bitmap,
}

impl std::fmt::Debug for TextFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFace::Outline(_) => f.write_str("TextFace::Outline"),
            TextFace::Bitmap => f.write_str("TextFace::Bitmap"),
        }
    }
}

impl TextFace {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Font::try_from_vec(bytes)
            .map(TextFace::Outline)
            .ok_or_else(|| LabelError::Config("font data is not a valid TrueType font".to_string()))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let face = Self::from_bytes(bytes)?;
        log::info!("Loaded label font {}", path.display());
        Ok(face)
    }

    /// Advance width of `text` at `size` pixels
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        if text.is_empty() || size <= 0.0 {
            return 0.0;
        }
        match self {
            TextFace::Outline(font) => font
                .layout(text, Scale::uniform(size), point(0.0, 0.0))
                .last()
                .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                .unwrap_or(0.0),
            TextFace::Bitmap => {
                let cell = bitmap_cell(size) as f32;
                let count = text.chars().count() as f32;
                count * GLYPH_ADVANCE as f32 * cell - cell
            }
        }
    }

    /// Longest prefix of `text` that fits `max_width`, with an ellipsis if cut.
    pub fn fit(&self, text: &str, size: f32, max_width: f32) -> String {
        if self.measure(text, size) <= max_width {
            return text.to_string();
        }
        let chars: Vec<char> = text.chars().collect();
        for end in (0..chars.len()).rev() {
            let candidate: String = chars[..end].iter().collect::<String>() + ELLIPSIS;
            if self.measure(&candidate, size) <= max_width {
                return candidate;
            }
        }
        String::new()
    }

    /// Paint one line of text with its line box top at `y`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        x: f32,
        y: f32,
        size: f32,
        color: [u8; 4],
        bold: bool,
        text: &str,
    ) {
        if text.is_empty() || size <= 0.0 {
            return;
        }
        let strikes: &[f32] = if bold { &[0.0, 1.0] } else { &[0.0] };
        match self {
            TextFace::Outline(font) => {
                let scale = Scale::uniform(size);
                let ascent = font.v_metrics(scale).ascent;
                let offset = (size / 24.0).max(1.0);
                for strike in strikes {
                    draw_outline(canvas, font, scale, x + strike * offset, y + ascent, color, text);
                }
            }
            TextFace::Bitmap => {
                let cell = bitmap_cell(size);
                // Center the 7-row glyph in the line box
                let top = y + (size - (GLYPH_ROWS as u32 * cell) as f32) / 2.0;
                for strike in strikes {
                    let mut pen = (x + strike * cell as f32).round() as i32;
                    for ch in text.chars() {
                        draw_bitmap_glyph(canvas, pen, top.round() as i32, ch, color, cell);
                        pen += (GLYPH_ADVANCE * cell) as i32;
                    }
                }
            }
        }
    }
}

fn draw_outline(
    canvas: &mut RgbaImage,
    font: &Font<'static>,
    scale: Scale,
    x: f32,
    baseline: f32,
    color: [u8; 4],
    text: &str,
) {
    let (width, height) = canvas.dimensions();
    for glyph in font.layout(text, scale, point(x, baseline)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                    blend(pixel, color, coverage);
                }
            });
        }
    }
}

fn blend(pixel: &mut Rgba<u8>, color: [u8; 4], coverage: f32) {
    let alpha = coverage.clamp(0.0, 1.0) * color[3] as f32 / 255.0;
    for channel in 0..3 {
        let existing = pixel.0[channel] as f32;
        pixel.0[channel] = (existing * (1.0 - alpha) + color[channel] as f32 * alpha).round() as u8;
    }
    pixel.0[3] = 255;
}

// ---------------------- 5x7 bitmap face ----------------------

const GLYPH_ROWS: usize = 7;
/// Five columns plus one column of spacing
const GLYPH_ADVANCE: u32 = 6;

/// Pixel block size for one glyph dot at the given font size
fn bitmap_cell(size: f32) -> u32 {
    ((size * 0.7) / GLYPH_ROWS as f32).round().max(1.0) as u32
}

fn draw_bitmap_glyph(canvas: &mut RgbaImage, x: i32, y: i32, ch: char, color: [u8; 4], cell: u32) {
    let Some(rows) = glyph_rows(fold_char(ch)) else {
        return;
    };
    let (width, height) = canvas.dimensions();
    for (row_idx, bits) in rows.iter().enumerate() {
        for col in 0..5 {
            if (bits >> (4 - col)) & 1 == 0 {
                continue;
            }
            let px = x + col * cell as i32;
            let py = y + row_idx as i32 * cell as i32;
            for dy in 0..cell as i32 {
                for dx in 0..cell as i32 {
                    let sx = px + dx;
                    let sy = py + dy;
                    if sx >= 0 && sy >= 0 && (sx as u32) < width && (sy as u32) < height {
                        canvas.put_pixel(sx as u32, sy as u32, Rgba(color));
                    }
                }
            }
        }
    }
}

/// Map accented and lower-case letters onto the upper-case glyph set
fn fold_char(ch: char) -> char {
    match ch {
        'à' | 'â' | 'ä' | 'á' | 'À' | 'Â' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'î' | 'ï' | 'í' | 'Î' | 'Ï' => 'I',
        'ô' | 'ö' | 'ó' | 'Ô' | 'Ö' => 'O',
        'ù' | 'û' | 'ü' | 'ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' | 'Ç' => 'C',
        'ñ' | 'Ñ' => 'N',
        '’' => '\'',
        _ => ch.to_ascii_uppercase(),
    }
}

#[rustfmt::skip]
fn glyph_rows(ch: char) -> Option<[u8; GLYPH_ROWS]> {
    let rows = match ch {
        'A' => [0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001],
        'B' => [0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110],
        'C' => [0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110],
        'D' => [0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100],
        'E' => [0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111],
        'F' => [0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000],
        'G' => [0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111],
        'H' => [0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001],
        'I' => [0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110],
        'J' => [0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100],
        'K' => [0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001],
        'L' => [0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111],
        'M' => [0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001],
        'N' => [0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001],
        'O' => [0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110],
        'P' => [0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000],
        'Q' => [0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101],
        'R' => [0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001],
        'S' => [0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110],
        'T' => [0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100],
        'U' => [0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110],
        'V' => [0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100],
        'W' => [0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010],
        'X' => [0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001],
        'Y' => [0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100],
        'Z' => [0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111],
        '0' => [0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110],
        '1' => [0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110],
        '2' => [0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111],
        '3' => [0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110],
        '4' => [0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010],
        '5' => [0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110],
        '6' => [0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110],
        '7' => [0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000],
        '8' => [0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110],
        '9' => [0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100],
        '-' => [0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000],
        '.' => [0b00000,0b00000,0b00000,0b00000,0b00000,0b01100,0b01100],
        ',' => [0b00000,0b00000,0b00000,0b00000,0b01100,0b00100,0b01000],
        ':' => [0b00000,0b01100,0b01100,0b00000,0b01100,0b01100,0b00000],
        '/' => [0b00000,0b00001,0b00010,0b00100,0b01000,0b10000,0b00000],
        '!' => [0b00100,0b00100,0b00100,0b00100,0b00100,0b00000,0b00100],
        '?' => [0b01110,0b10001,0b00001,0b00010,0b00100,0b00000,0b00100],
        '#' => [0b01010,0b01010,0b11111,0b01010,0b11111,0b01010,0b01010],
        '(' => [0b00010,0b00100,0b01000,0b01000,0b01000,0b00100,0b00010],
        ')' => [0b01000,0b00100,0b00010,0b00010,0b00010,0b00100,0b01000],
        '\'' => [0b00100,0b00100,0b01000,0b00000,0b00000,0b00000,0b00000],
        '&' => [0b01100,0b10010,0b10100,0b01000,0b10101,0b10010,0b01101],
        '+' => [0b00000,0b00100,0b00100,0b11111,0b00100,0b00100,0b00000],
        '=' => [0b00000,0b00000,0b11111,0b00000,0b11111,0b00000,0b00000],
        '_' => [0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b11111],
        ' ' => [0; GLYPH_ROWS],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_measure() {
        let face = TextFace::Bitmap;
        // size 10 -> cell 1 -> 6px per glyph minus trailing spacing
        assert_eq!(face.measure("AB", 10.0), 11.0);
        assert_eq!(face.measure("", 10.0), 0.0);
    }

    #[test]
    fn test_fit_adds_ellipsis() {
        let face = TextFace::Bitmap;
        let fitted = face.fit("STORAGE ROOM", 10.0, 40.0);
        assert!(fitted.ends_with(ELLIPSIS));
        assert!(face.measure(&fitted, 10.0) <= 40.0);
        assert_eq!(face.fit("BOX", 10.0, 40.0), "BOX");
    }

    #[test]
    fn test_bitmap_draws_dark_pixels() {
        let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        TextFace::Bitmap.draw(&mut canvas, 1.0, 1.0, 14.0, [0, 0, 0, 255], false, "B1");
        assert!(canvas.pixels().any(|p| p.0[0] == 0));
    }

    #[test]
    fn test_fold_char() {
        assert_eq!(fold_char('é'), 'E');
        assert_eq!(fold_char('x'), 'X');
        assert!(glyph_rows(fold_char('ç')).is_some());
    }
}
