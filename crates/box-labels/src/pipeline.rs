//! Label generation pipeline
//!
//! Selection -> item records -> slot placement -> per-label render and
//! rasterize -> batch in slot order. Every label is an independent task;
//! a failed or timed-out label is recorded and skipped, never fatal.

use crate::layout::{place_all_pages, validate_offset};
use crate::options::{PrintOptions, RasterOptions, RenderOptions};
use crate::preset::LabelPreset;
use crate::qr::QrResolver;
use crate::render::{
    LabelBitmap, Rasterize, SurfaceRasterizer, SurfaceSize, TextFace, render_label,
};
use crate::selection::{PrintSelection, SelectionOrder};
use crate::store::ItemStore;
use crate::types::{FailureStage, LabelError, LabelFailure, PrintableItem, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one generation run
#[derive(Debug, Clone, Default)]
pub struct RasterBatch {
    /// Pages the selection spans, including pages whose labels all failed
    pub pages: usize,
    /// Successful labels, ordered by slot
    pub bitmaps: Vec<LabelBitmap>,
    /// Skipped labels, ordered by slot
    pub failures: Vec<LabelFailure>,
}

impl RasterBatch {
    pub fn placed_count(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

pub struct LabelPipeline<R> {
    resolver: QrResolver,
    rasterizer: Arc<R>,
    render: RenderOptions,
    raster: RasterOptions,
}

impl<R> Clone for LabelPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            rasterizer: Arc::clone(&self.rasterizer),
            render: self.render.clone(),
            raster: self.raster.clone(),
        }
    }
}

impl LabelPipeline<SurfaceRasterizer> {
    /// Pipeline with the default rasterizer, loading the configured font.
    pub async fn from_options(options: &PrintOptions) -> Result<Self> {
        options.validate()?;
        let face = match &options.font_path {
            Some(path) => TextFace::load(path).await?,
            None => TextFace::Bitmap,
        };
        let rasterizer = SurfaceRasterizer::new(Arc::new(face), options.render.pixel_ratio);
        let resolver = QrResolver::new(options.qr_base_dir.clone().unwrap_or_else(|| ".".into()))
            .with_fallback_base_url(options.qr_fallback_base_url.clone())
            .with_timeout(options.raster.timeout());
        Ok(Self::new(Arc::new(rasterizer), resolver).with_options(options))
    }
}

impl<R: Rasterize + 'static> LabelPipeline<R> {
    pub fn new(rasterizer: Arc<R>, resolver: QrResolver) -> Self {
        Self {
            resolver,
            rasterizer,
            render: RenderOptions::default(),
            raster: RasterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: &PrintOptions) -> Self {
        self.render = options.render.clone();
        self.raster = options.raster.clone();
        self
    }

    pub fn resolver(&self) -> &QrResolver {
        &self.resolver
    }

    /// Fetch the selected records, order them and generate their labels.
    ///
    /// A store failure or a selected id without a record aborts with
    /// `ItemFetchFailed` before anything is rendered.
    pub async fn generate_selection<S: ItemStore>(
        &self,
        store: &S,
        selection: &PrintSelection,
        order: SelectionOrder,
        preset: &LabelPreset,
        start_offset: usize,
    ) -> Result<RasterBatch> {
        let items = store
            .fetch_items(selection.ids())
            .await
            .map_err(|e| match e {
                LabelError::ItemFetchFailed(_) => e,
                other => LabelError::ItemFetchFailed(other.to_string()),
            })?;
        let items = selection.order_items(items, order)?;
        self.generate(preset, &items, start_offset).await
    }

    /// Render and rasterize every item at its slot.
    ///
    /// Waits for all labels to settle. Results come back in slot order no
    /// matter which label finished first.
    pub async fn generate(
        &self,
        preset: &LabelPreset,
        items: &[PrintableItem],
        start_offset: usize,
    ) -> Result<RasterBatch> {
        preset.validate()?;
        validate_offset(preset, start_offset as i64)?;
        let size =
            SurfaceSize::with_gap(preset, self.render.available_width_px, self.render.gap_px)?;
        let pages = place_all_pages(preset, items, start_offset)?;

        let total_slots = preset.total_slots();
        let semaphore = Arc::new(Semaphore::new(self.raster.concurrency.max(1)));
        let timeout = self.raster.timeout();
        let mut pending: HashMap<usize, String> = HashMap::new();
        let mut tasks = JoinSet::new();

        for page in &pages {
            for (idx, item) in page.occupied() {
                let slot = page.index * total_slots + idx;
                let item = (*item).clone();
                pending.insert(slot, item.id.clone());

                let semaphore = Arc::clone(&semaphore);
                let resolver = self.resolver.clone();
                let rasterizer = Arc::clone(&self.rasterizer);
                tasks.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        let closed =
                            failure(slot, &item.id, FailureStage::Rasterize, "pipeline closed");
                        return (slot, Err(closed));
                    };
                    let work = label_task(slot, &item, size, &resolver, rasterizer);
                    let outcome = match tokio::time::timeout(timeout, work).await {
                        Ok(Ok(mut bitmap)) => {
                            bitmap.slot = slot;
                            Ok(bitmap)
                        }
                        Ok(Err(e)) => Err(failure_from_error(slot, &item.id, e)),
                        Err(_) => Err(failure(
                            slot,
                            &item.id,
                            FailureStage::Rasterize,
                            &format!("timed out after {}ms", timeout.as_millis()),
                        )),
                    };
                    (slot, outcome)
                });
            }
        }

        log::debug!(
            "Generating {} label(s) on {} page(s) for preset {}",
            pending.len(),
            pages.len(),
            preset.id
        );

        let mut batch = RasterBatch {
            pages: pages.len(),
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    pending.remove(&slot);
                    match outcome {
                        Ok(bitmap) => batch.bitmaps.push(bitmap),
                        Err(failed) => batch.failures.push(failed),
                    }
                }
                Err(e) => log::error!("Label task ended abnormally: {e}"),
            }
        }
        for (slot, item_id) in pending {
            batch.failures.push(failure(
                slot,
                &item_id,
                FailureStage::Rasterize,
                "label task did not complete",
            ));
        }

        batch.bitmaps.sort_by_key(|bitmap| bitmap.slot);
        batch.failures.sort_by_key(|failed| failed.slot);
        for failed in &batch.failures {
            log::warn!(
                "Skipping label for {} at slot {}: {}",
                failed.item_id,
                failed.slot,
                failed.reason
            );
        }
        log::info!(
            "Generated {} label(s), {} failed",
            batch.placed_count(),
            batch.failed_count()
        );
        Ok(batch)
    }
}

async fn label_task<R: Rasterize + 'static>(
    slot: usize,
    item: &PrintableItem,
    size: SurfaceSize,
    resolver: &QrResolver,
    rasterizer: Arc<R>,
) -> Result<LabelBitmap> {
    let qr = resolver.resolve(slot, item).await?;
    let surface = render_label(slot, item, qr, size);
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&surface)).await?
}

fn failure(slot: usize, item_id: &str, stage: FailureStage, reason: &str) -> LabelFailure {
    LabelFailure {
        slot,
        item_id: item_id.to_string(),
        stage,
        reason: reason.to_string(),
    }
}

fn failure_from_error(slot: usize, item_id: &str, err: LabelError) -> LabelFailure {
    match err {
        LabelError::LabelRenderFailed { reason, .. } => {
            failure(slot, item_id, FailureStage::Render, &reason)
        }
        LabelError::RasterizeFailed { reason, .. } => {
            failure(slot, item_id, FailureStage::Rasterize, &reason)
        }
        other => failure(slot, item_id, FailureStage::Rasterize, &other.to_string()),
    }
}
