//! Label sheet presets and the preset registry
//!
//! A preset describes the physical grid of a sticker sheet. The registry
//! holds the built-in catalog plus at most one user-defined custom preset
//! read from user settings.

use crate::constants::{A4_HEIGHT_CM, A4_WIDTH_CM, MAX_SLOTS_PER_PAGE};
use crate::types::{LabelError, Result};
use serde::{Deserialize, Serialize};

/// A named page-layout template. All lengths are in centimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPreset {
    pub id: String,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    #[serde(alias = "labelWidthCm")]
    pub label_width: f32,
    #[serde(alias = "labelHeightCm")]
    pub label_height: f32,
    #[serde(alias = "marginTopCm")]
    pub margin_top: f32,
    #[serde(alias = "marginLeftCm")]
    pub margin_left: f32,
    #[serde(alias = "gutterXcm")]
    pub gutter_x: f32,
    #[serde(alias = "gutterYcm")]
    pub gutter_y: f32,
}

/// Physical output page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_cm: f32,
    pub height_cm: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width_cm: A4_WIDTH_CM,
        height_cm: A4_HEIGHT_CM,
    };
}

impl LabelPreset {
    /// Slots per page
    pub fn total_slots(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Width / height of one label
    pub fn aspect_ratio(&self) -> f32 {
        self.label_width / self.label_height
    }

    /// Top-left corner of the label at (row, col), in centimeters from the page's top-left.
    pub fn slot_origin_cm(&self, row: usize, col: usize) -> (f32, f32) {
        let x = self.margin_left + col as f32 * (self.label_width + self.gutter_x);
        let y = self.margin_top + row as f32 * (self.label_height + self.gutter_y);
        (x, y)
    }

    /// Whether the bottom-right label stays on the page.
    pub fn fits_page(&self, page: PageSize) -> bool {
        if self.rows == 0 || self.cols == 0 {
            return true;
        }
        let (x, y) = self.slot_origin_cm(self.rows - 1, self.cols - 1);
        x + self.label_width <= page.width_cm + f32::EPSILON
            && y + self.label_height <= page.height_cm + f32::EPSILON
    }

    /// Reject presets that cannot be laid out.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(LabelError::InvalidPreset(format!(
                "{}: rows and cols must be at least 1 (got {}x{})",
                self.id, self.rows, self.cols
            )));
        }
        match self.rows.checked_mul(self.cols) {
            Some(total) if total <= MAX_SLOTS_PER_PAGE => {}
            _ => {
                return Err(LabelError::InvalidPreset(format!(
                    "{}: {}x{} exceeds {} labels per sheet",
                    self.id, self.rows, self.cols, MAX_SLOTS_PER_PAGE
                )));
            }
        }
        let positive = [
            ("label width", self.label_width),
            ("label height", self.label_height),
        ];
        for (what, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LabelError::InvalidPreset(format!(
                    "{}: {} must be > 0 (got {})",
                    self.id, what, value
                )));
            }
        }
        let non_negative = [
            ("top margin", self.margin_top),
            ("left margin", self.margin_left),
            ("horizontal gutter", self.gutter_x),
            ("vertical gutter", self.gutter_y),
        ];
        for (what, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LabelError::InvalidPreset(format!(
                    "{}: {} must be >= 0 (got {})",
                    self.id, what, value
                )));
            }
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn builtin(
    id: &str,
    name: &str,
    rows: usize,
    cols: usize,
    label_width: f32,
    label_height: f32,
    margin_top: f32,
    margin_left: f32,
    gutter_x: f32,
    gutter_y: f32,
) -> LabelPreset {
    LabelPreset {
        id: id.to_string(),
        name: name.to_string(),
        rows,
        cols,
        label_width,
        label_height,
        margin_top,
        margin_left,
        gutter_x,
        gutter_y,
    }
}

/// Id of the default preset (first built-in)
pub const DEFAULT_PRESET_ID: &str = "microapp-5057";

/// Built-in sheet catalog. The first entry is the default.
#[rustfmt::skip]
pub fn builtin_presets() -> Vec<LabelPreset> {
    vec![
        // Micro Application
        builtin(DEFAULT_PRESET_ID, "Micro Application 5057 (6.05 × 2.96 cm)", 8, 3, 6.05, 2.96, 2.35, 1.2, 0.2, 0.2),
        // Avery
        builtin("avery-l7163", "Avery L7163 (14 labels, 99.1 × 38.1 mm)", 7, 2, 9.91, 3.81, 1.5, 0.6, 0.2, 0.0),
        builtin("avery-l7160", "Avery L7160 (21 labels, 63.5 × 38.1 mm)", 7, 3, 6.35, 3.81, 1.5, 0.35, 0.2, 0.0),
        builtin("avery-l7161", "Avery L7161 (18 labels, 63.5 × 46.6 mm)", 6, 3, 6.35, 4.66, 1.1, 0.35, 0.2, 0.0),
        builtin("avery-l7173", "Avery L7173 (8 labels, 99.1 × 67.7 mm)", 4, 2, 9.91, 6.77, 1.2, 0.6, 0.2, 0.2),
        builtin("avery-l7165", "Avery L7165 (8 labels, 99.1 × 67.7 mm)", 4, 2, 9.91, 6.77, 1.5, 0.6, 0.2, 0.2),
        // Generic logistics
        builtin("amazon-standard", "Amazon A4 6×2 (100 × 40 mm)", 6, 2, 10.0, 4.0, 1.0, 1.0, 0.5, 0.5),
        builtin("amazon-large", "Amazon Large 4×2 (100 × 70 mm)", 4, 2, 10.0, 7.0, 1.0, 1.0, 0.5, 0.5),
        builtin("amazon-small-rect", "Amazon Small 8×3 (60 × 30 mm)", 8, 3, 6.0, 3.0, 0.8, 0.5, 0.2, 0.2),
        // Herma
        builtin("herma-4427", "Herma 4427 (12 labels, 97 × 42.3 mm)", 6, 2, 9.7, 4.23, 1.5, 0.4, 0.2, 0.2),
        builtin("herma-4452", "Herma 4452 (24 labels, 70 × 32 mm)", 8, 3, 7.0, 3.2, 1.0, 0.4, 0.2, 0.15),
        builtin("herma-4461", "Herma 4461 (40 labels, 48 × 21 mm)", 10, 4, 4.8, 2.1, 0.9, 0.5, 0.2, 0.2),
    ]
}

// =============================================================================
// Custom preset (user settings)
// =============================================================================

/// Custom preset fields as stored in user settings. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPresetSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "labelWidth")]
    pub label_width_cm: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "labelHeight")]
    pub label_height_cm: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "marginTop")]
    pub margin_top_cm: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "marginLeft")]
    pub margin_left_cm: Option<f32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "gutterXcm",
        alias = "gutterX"
    )]
    pub gutter_x_cm: Option<f32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "gutterYcm",
        alias = "gutterY"
    )]
    pub gutter_y_cm: Option<f32>,
}

pub const CUSTOM_PRESET_ID: &str = "custom";

impl CustomPresetSettings {
    /// Fill missing fields with defaults. Explicit values, including zero, are kept.
    pub fn to_preset(&self) -> LabelPreset {
        LabelPreset {
            id: self
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| CUSTOM_PRESET_ID.to_string()),
            name: self
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Custom".to_string()),
            rows: self.rows.unwrap_or(1),
            cols: self.cols.unwrap_or(1),
            label_width: self.label_width_cm.unwrap_or(1.0),
            label_height: self.label_height_cm.unwrap_or(1.0),
            margin_top: self.margin_top_cm.unwrap_or(0.0),
            margin_left: self.margin_left_cm.unwrap_or(0.0),
            gutter_x: self.gutter_x_cm.unwrap_or(0.0),
            gutter_y: self.gutter_y_cm.unwrap_or(0.0),
        }
    }

    pub fn from_preset(preset: &LabelPreset) -> Self {
        Self {
            id: Some(preset.id.clone()),
            name: Some(preset.name.clone()),
            rows: Some(preset.rows),
            cols: Some(preset.cols),
            label_width_cm: Some(preset.label_width),
            label_height_cm: Some(preset.label_height),
            margin_top_cm: Some(preset.margin_top),
            margin_left_cm: Some(preset.margin_left),
            gutter_x_cm: Some(preset.gutter_x),
            gutter_y_cm: Some(preset.gutter_y),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered catalog of presets: built-ins first, then the custom preset.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: Vec<LabelPreset>,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetRegistry {
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Registry with exactly the given presets, in order.
    pub fn from_presets(presets: Vec<LabelPreset>) -> Self {
        Self { presets }
    }

    /// Append a user-defined preset unless one with the same id is already listed.
    ///
    /// Returns true if the preset was added.
    pub fn add_custom(&mut self, preset: LabelPreset) -> bool {
        if self.presets.iter().any(|p| p.id == preset.id) {
            log::debug!("Preset {} already registered, not re-adding", preset.id);
            return false;
        }
        log::debug!("Registered custom preset {}", preset.id);
        self.presets.push(preset);
        true
    }

    /// Merge the custom preset from user settings, if any.
    pub fn merge_settings(&mut self, settings: Option<&CustomPresetSettings>) -> Option<String> {
        let preset = settings?.to_preset();
        let id = preset.id.clone();
        self.add_custom(preset);
        Some(id)
    }

    pub fn list(&self) -> &[LabelPreset] {
        &self.presets
    }

    /// The first built-in preset
    pub fn default_preset(&self) -> Option<&LabelPreset> {
        self.presets.first()
    }

    /// Look up a preset by id and validate it.
    pub fn resolve(&self, id: &str) -> Result<&LabelPreset> {
        let preset = self
            .presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| LabelError::NotFound(id.to_string()))?;
        preset.validate()?;
        Ok(preset)
    }

    /// Resolve `id`, falling back to the default preset when it is unknown.
    ///
    /// Unknown ids are an expected condition (stale settings); a preset that
    /// exists but is invalid is still an error.
    pub fn resolve_or_default(&self, id: &str) -> Result<&LabelPreset> {
        match self.resolve(id) {
            Err(LabelError::NotFound(_)) => {
                let fallback = self
                    .default_preset()
                    .ok_or_else(|| LabelError::NotFound(id.to_string()))?;
                log::warn!("Unknown preset {id}, falling back to {}", fallback.id);
                fallback.validate()?;
                Ok(fallback)
            }
            other => other,
        }
    }
}
