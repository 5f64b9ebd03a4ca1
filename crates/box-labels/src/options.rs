use crate::constants::*;
use crate::preset::DEFAULT_PRESET_ID;
use crate::selection::SelectionOrder;
use crate::types::{LabelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unit used for user-entered preset dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Cm,
    Mm,
    In,
    Pt,
}

impl LengthUnit {
    pub fn name(&self) -> &'static str {
        match self {
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::In => "in",
            LengthUnit::Pt => "pt",
        }
    }

    pub fn to_cm(&self, value: f32) -> f32 {
        match self {
            LengthUnit::Cm => value,
            LengthUnit::Mm => value / 10.0,
            LengthUnit::In => value * 2.54,
            LengthUnit::Pt => value * 2.54 / 72.0,
        }
    }

    pub fn from_cm(&self, value: f32) -> f32 {
        match self {
            LengthUnit::Cm => value,
            LengthUnit::Mm => value * 10.0,
            LengthUnit::In => value / 2.54,
            LengthUnit::Pt => value * 72.0 / 2.54,
        }
    }
}

impl std::str::FromStr for LengthUnit {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cm" => Ok(LengthUnit::Cm),
            "mm" => Ok(LengthUnit::Mm),
            "in" | "inch" | "inches" => Ok(LengthUnit::In),
            "pt" | "points" => Ok(LengthUnit::Pt),
            other => Err(LabelError::Config(format!("Unknown length unit: {other}"))),
        }
    }
}

/// Sheet output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    /// Self-contained print page
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
        }
    }
}

/// Label surface sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Width the preview grid is laid out in
    pub available_width_px: f32,
    pub gap_px: f32,
    /// Device pixels per CSS pixel when rasterizing
    pub pixel_ratio: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            available_width_px: DEFAULT_AVAILABLE_WIDTH_PX,
            gap_px: PREVIEW_GAP_PX,
            pixel_ratio: DEFAULT_PIXEL_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Upper bound for one label, QR fetch included
    pub timeout_ms: u64,
    pub concurrency: usize,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_RASTER_TIMEOUT_MS,
            concurrency: DEFAULT_RASTER_CONCURRENCY,
        }
    }
}

impl RasterOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Print job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    pub preset_id: String,
    pub start_offset: usize,
    pub sort: SelectionOrder,
    pub render: RenderOptions,
    pub raster: RasterOptions,
    /// TrueType font for label text; the built-in bitmap face otherwise
    pub font_path: Option<PathBuf>,
    /// Base URL for QR codes synthesized for items without one
    pub qr_fallback_base_url: Option<String>,
    /// Directory relative QR paths are resolved against
    pub qr_base_dir: Option<PathBuf>,
    pub output_format: OutputFormat,
    /// Open the print dialog when the HTML page loads
    pub auto_print: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            preset_id: DEFAULT_PRESET_ID.to_string(),
            start_offset: 0,
            sort: SelectionOrder::Insertion,
            render: RenderOptions::default(),
            raster: RasterOptions::default(),
            font_path: None,
            qr_fallback_base_url: None,
            qr_base_dir: None,
            output_format: OutputFormat::Pdf,
            auto_print: true,
        }
    }
}

impl PrintOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options = serde_json::from_slice(&bytes)
            .map_err(|e| LabelError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LabelError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        let render = &self.render;
        if !render.pixel_ratio.is_finite() || render.pixel_ratio < MIN_PIXEL_RATIO {
            return Err(LabelError::Config(format!(
                "Pixel ratio must be at least {MIN_PIXEL_RATIO} (got {})",
                render.pixel_ratio
            )));
        }
        if !render.available_width_px.is_finite() || render.available_width_px <= 0.0 {
            return Err(LabelError::Config(
                "Available width must be greater than zero".to_string(),
            ));
        }
        if !render.gap_px.is_finite() || render.gap_px < 0.0 {
            return Err(LabelError::Config("Gap cannot be negative".to_string()));
        }
        if self.raster.timeout_ms == 0 {
            return Err(LabelError::Config(
                "Rasterization timeout must be greater than zero".to_string(),
            ));
        }
        if self.raster.concurrency == 0 {
            return Err(LabelError::Config(
                "Rasterization concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
