use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),
    #[error("Invalid start offset {offset}: must be within 0..{total_slots}")]
    InvalidOffset { offset: i64, total_slots: usize },
    #[error("Preset not found: {0}")]
    NotFound(String),
    #[error("Item fetch failed: {0}")]
    ItemFetchFailed(String),
    #[error("Label render failed for slot {slot}: {reason}")]
    LabelRenderFailed { slot: usize, reason: String },
    #[error("Rasterization failed for slot {slot}: {reason}")]
    RasterizeFailed { slot: usize, reason: String },
    #[error("Nothing to print: no label was rasterized successfully")]
    NothingToPrint,
    #[error("Labels are still being generated")]
    Generating,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl LabelError {
    /// Errors that indicate a bug in the calling code or a broken preset.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LabelError::InvalidPreset(_) | LabelError::InvalidOffset { .. }
        )
    }

    /// Errors that only affect a single label and never abort a batch.
    pub fn is_per_label(&self) -> bool {
        matches!(
            self,
            LabelError::LabelRenderFailed { .. } | LabelError::RasterizeFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;

/// A box as seen by the print pipeline. Never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintableItem {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "number", alias = "displayCode")]
    pub display_code: String,
    #[serde(default, alias = "destination", alias = "destinationLabel")]
    pub destination_label: String,
    #[serde(default, alias = "qrcodeURL", alias = "qrImageRef")]
    pub qr_image_ref: Option<String>,
    #[serde(default, alias = "fragile", alias = "isFragile")]
    pub is_fragile: bool,
}

impl PrintableItem {
    pub fn new(id: impl Into<String>, display_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_code: display_code.into(),
            destination_label: String::new(),
            qr_image_ref: None,
            is_fragile: false,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination_label = destination.into();
        self
    }

    pub fn with_qr(mut self, qr_image_ref: impl Into<String>) -> Self {
        self.qr_image_ref = Some(qr_image_ref.into());
        self
    }

    pub fn fragile(mut self, is_fragile: bool) -> Self {
        self.is_fragile = is_fragile;
        self
    }

    /// The QR reference, treating an empty string as absent.
    pub fn qr_ref(&self) -> Option<&str> {
        self.qr_image_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Which stage a per-label failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    Render,
    Rasterize,
}

/// A label that was skipped. Its slot stays empty on the output sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFailure {
    /// Absolute slot index (across pages)
    pub slot: usize,
    pub item_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl LabelFailure {
    pub fn into_error(self) -> LabelError {
        match self.stage {
            FailureStage::Render => LabelError::LabelRenderFailed {
                slot: self.slot,
                reason: self.reason,
            },
            FailureStage::Rasterize => LabelError::RasterizeFailed {
                slot: self.slot,
                reason: self.reason,
            },
        }
    }
}
