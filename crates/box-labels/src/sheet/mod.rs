//! Sheet assembly
//!
//! Places rasterized labels on A4 pages using the preset's physical grid
//! and writes the result either as a PDF or as a self-contained HTML print
//! page. Both outputs share the placement computed here.

mod html;
mod pdf;

pub use html::render_html;
pub use pdf::render_pdf_bytes;

use crate::layout::{RectCm, slot_position, slot_rect_cm};
use crate::options::OutputFormat;
use crate::pipeline::RasterBatch;
use crate::preset::{LabelPreset, PageSize};
use crate::render::LabelBitmap;
use crate::types::{LabelError, LabelFailure, Result};
use std::path::Path;

/// A label bitmap at its place on the sheet
#[derive(Debug, Clone)]
pub struct PlacedLabel {
    /// Absolute slot index (across pages)
    pub slot: usize,
    pub row: usize,
    pub col: usize,
    /// The preset cell, in centimeters from the page's top-left
    pub cell: RectCm,
    /// The bitmap's footprint inside the cell (object-fit: contain)
    pub fitted: RectCm,
    pub bitmap: LabelBitmap,
}

#[derive(Debug, Clone)]
pub struct SheetPage {
    pub index: usize,
    pub labels: Vec<PlacedLabel>,
}

/// Assembled output, ready to be written
#[derive(Debug, Clone)]
pub struct LabelSheet {
    pub preset: LabelPreset,
    pub page: PageSize,
    pub pages: Vec<SheetPage>,
    /// Labels left out; their cells stay blank
    pub failures: Vec<LabelFailure>,
}

/// Lay the batch's bitmaps out on A4 pages.
///
/// Each bitmap goes to the cell of the slot it was rendered for; slots of
/// failed labels stay blank rather than being compacted. Refuses with
/// `NothingToPrint` when the batch has no bitmap at all.
pub fn assemble(preset: &LabelPreset, batch: RasterBatch) -> Result<LabelSheet> {
    preset.validate()?;
    if batch.bitmaps.is_empty() {
        return Err(LabelError::NothingToPrint);
    }

    let page = PageSize::A4;
    if !preset.fits_page(page) {
        log::warn!(
            "Preset {} extends past the {}x{}cm page; outer labels will be clipped",
            preset.id,
            page.width_cm,
            page.height_cm
        );
    }

    let last_page = batch
        .bitmaps
        .iter()
        .map(|bitmap| slot_position(preset, bitmap.slot).page)
        .max()
        .unwrap_or(0);
    let page_count = batch.pages.max(last_page + 1);

    let mut pages: Vec<SheetPage> = (0..page_count)
        .map(|index| SheetPage {
            index,
            labels: Vec::new(),
        })
        .collect();

    for bitmap in batch.bitmaps {
        let position = slot_position(preset, bitmap.slot);
        let labels = &mut pages[position.page].labels;
        if labels.iter().any(|placed| placed.slot == bitmap.slot) {
            log::warn!("Slot {} has more than one label, keeping the first", bitmap.slot);
            continue;
        }
        let cell = slot_rect_cm(preset, position.row, position.col);
        labels.push(PlacedLabel {
            slot: bitmap.slot,
            row: position.row,
            col: position.col,
            cell,
            fitted: cell.contain(bitmap.aspect_ratio()),
            bitmap,
        });
    }

    for page in &mut pages {
        page.labels.sort_by_key(|placed| placed.slot);
    }

    let sheet = LabelSheet {
        preset: preset.clone(),
        page,
        pages,
        failures: batch.failures,
    };
    log::info!(
        "Assembled {} label(s) on {} page(s), {} failed",
        sheet.label_count(),
        sheet.page_count(),
        sheet.failed_count()
    );
    Ok(sheet)
}

impl LabelSheet {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn label_count(&self) -> usize {
        self.pages.iter().map(|page| page.labels.len()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &PlacedLabel> {
        self.pages.iter().flat_map(|page| page.labels.iter())
    }

    /// Render to `format` and write to `path`.
    pub async fn save(
        self,
        path: impl AsRef<Path>,
        format: OutputFormat,
        auto_print: bool,
    ) -> Result<()> {
        let path = path.as_ref().to_owned();
        let bytes = tokio::task::spawn_blocking(move || match format {
            OutputFormat::Pdf => render_pdf_bytes(&self),
            OutputFormat::Html => render_html(&self, auto_print).map(String::into_bytes),
        })
        .await??;
        tokio::fs::write(&path, bytes).await?;
        log::info!("Wrote label sheet to {}", path.display());
        Ok(())
    }
}
