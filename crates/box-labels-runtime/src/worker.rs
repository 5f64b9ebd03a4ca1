use box_labels::{
    ItemStore, LabelError, LabelPipeline, LabelPreset, PresetRegistry, PrintOptions,
    PrintSelection, RasterBatch, Rasterize, SelectionOrder, UserSettings, assemble,
    validate_offset,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{GenerationId, OutputFormat, PrintCommand, PrintUpdate};

/// Initial state of a print session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub registry: PresetRegistry,
    pub preset_id: String,
    pub start_offset: usize,
    pub sort: SelectionOrder,
    /// Open the print dialog when an exported HTML page loads
    pub auto_print: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_options(&PrintOptions::default(), PresetRegistry::builtin())
    }
}

impl SessionConfig {
    pub fn from_options(options: &PrintOptions, registry: PresetRegistry) -> Self {
        Self {
            registry,
            preset_id: options.preset_id.clone(),
            start_offset: options.start_offset,
            sort: options.sort,
            auto_print: options.auto_print,
        }
    }
}

struct GenerationResult {
    generation: GenerationId,
    preset: LabelPreset,
    result: box_labels::Result<RasterBatch>,
}

/// Labels generated for the current state, with the preset they were laid out on
struct ReadyBatch {
    generation: GenerationId,
    preset: LabelPreset,
    batch: RasterBatch,
}

struct InFlight {
    generation: GenerationId,
    handle: JoinHandle<()>,
}

enum Flow {
    Continue,
    Stop,
}

struct Session<S, R> {
    store: Arc<S>,
    pipeline: Arc<LabelPipeline<R>>,
    registry: PresetRegistry,
    preset_id: String,
    start_offset: usize,
    sort: SelectionOrder,
    auto_print: bool,
    selection: PrintSelection,
    generation: GenerationId,
    in_flight: Option<InFlight>,
    ready: Option<ReadyBatch>,
    result_tx: mpsc::UnboundedSender<GenerationResult>,
    update_tx: mpsc::UnboundedSender<PrintUpdate>,
}

/// Async worker task that owns one print session.
///
/// Selection, preset and offset live here. Generation runs in the
/// background; its result is only applied if nothing changed since it
/// started. Returns when the command channel closes or on `Shutdown`.
pub async fn print_worker<S, R>(
    mut command_rx: mpsc::UnboundedReceiver<PrintCommand>,
    update_tx: mpsc::UnboundedSender<PrintUpdate>,
    store: Arc<S>,
    pipeline: Arc<LabelPipeline<R>>,
    config: SessionConfig,
) where
    S: ItemStore + 'static,
    R: Rasterize + 'static,
{
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        store,
        pipeline,
        registry: config.registry,
        preset_id: config.preset_id,
        start_offset: config.start_offset,
        sort: config.sort,
        auto_print: config.auto_print,
        selection: PrintSelection::new(),
        generation: GenerationId::default(),
        in_flight: None,
        ready: None,
        result_tx,
        update_tx,
    };
    session.announce_presets();

    let mut deferred: VecDeque<PrintCommand> = VecDeque::new();
    loop {
        if let Some(cmd) = deferred.pop_front() {
            if let Flow::Stop = session.process_command(cmd, &mut command_rx, &mut deferred).await {
                break;
            }
            continue;
        }

        tokio::select! {
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let flow = session
                    .process_command(cmd, &mut command_rx, &mut deferred)
                    .await;
                if let Flow::Stop = flow {
                    break;
                }
            }
            Some(done) = result_rx.recv() => session.apply_result(done),
        }
    }

    session.cancel_in_flight();
    log::debug!("Print worker stopped");
}

impl<S, R> Session<S, R>
where
    S: ItemStore + 'static,
    R: Rasterize + 'static,
{
    fn send(&self, update: PrintUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn send_error(&self, error: &LabelError) {
        self.send(PrintUpdate::Error {
            message: error.to_string(),
        });
    }

    async fn process_command(
        &mut self,
        cmd: PrintCommand,
        command_rx: &mut mpsc::UnboundedReceiver<PrintCommand>,
        deferred: &mut VecDeque<PrintCommand>,
    ) -> Flow {
        match cmd {
            PrintCommand::ToggleItem { id } => {
                self.selection.toggle(&id);
                self.selection_changed();
            }
            PrintCommand::ClearSelection => {
                self.selection.clear();
                self.selection_changed();
            }
            PrintCommand::SetPreset { preset_id } => self.handle_set_preset(&preset_id),
            PrintCommand::SetStartOffset { offset } => self.handle_set_offset(offset),
            PrintCommand::MergeUserSettings { settings } => self.handle_merge_settings(&settings),
            PrintCommand::Generate => {
                // Coalesce queued generate requests; keep the first other command for later
                while let Ok(next_cmd) = command_rx.try_recv() {
                    if let PrintCommand::Generate = next_cmd {
                        log::debug!("Discarding queued generate request, using newer one");
                    } else {
                        deferred.push_back(next_cmd);
                        break;
                    }
                }
                self.handle_generate();
            }
            PrintCommand::Export { path, format } => self.handle_export(path, format).await,
            PrintCommand::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Invalidate everything derived from the previous state.
    fn bump_generation(&mut self) {
        self.generation = self.generation.next();
        self.ready = None;
        if let Some(stale) = self.in_flight.take() {
            stale.handle.abort();
            log::debug!("Discarding generation {} in flight", stale.generation);
            self.send(PrintUpdate::Discarded {
                generation: stale.generation,
            });
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(stale) = self.in_flight.take() {
            stale.handle.abort();
        }
    }

    fn selection_changed(&mut self) {
        self.bump_generation();
        self.send(PrintUpdate::SelectionChanged {
            selected: self.selection.ids().to_vec(),
        });
    }

    fn announce_presets(&self) {
        self.send(PrintUpdate::PresetsListed {
            presets: self.registry.list().to_vec(),
        });
        match self.registry.resolve_or_default(&self.preset_id) {
            Ok(preset) => self.send(PrintUpdate::PresetChanged {
                preset: preset.clone(),
                start_offset: self.start_offset,
            }),
            Err(e) => self.send_error(&e),
        }
    }

    fn handle_set_preset(&mut self, preset_id: &str) {
        let preset = match self.registry.resolve_or_default(preset_id) {
            Ok(preset) => preset.clone(),
            Err(e) => {
                self.send_error(&e);
                return;
            }
        };
        if self.start_offset >= preset.total_slots() {
            log::info!(
                "Start slot {} does not exist on {}, starting at the first slot",
                self.start_offset,
                preset.id
            );
            self.start_offset = 0;
        }
        self.preset_id = preset.id.clone();
        self.bump_generation();
        self.send(PrintUpdate::PresetChanged {
            preset,
            start_offset: self.start_offset,
        });
    }

    /// Register the custom preset from user settings and switch to it.
    fn handle_merge_settings(&mut self, settings: &UserSettings) {
        let before = self.registry.resolve_or_default(&self.preset_id).ok().cloned();
        let target = match self.registry.merge_settings(settings.print_settings.as_ref()) {
            Some(id) => {
                log::info!("Custom preset {id} available");
                id
            }
            None => self.preset_id.clone(),
        };
        self.send(PrintUpdate::PresetsListed {
            presets: self.registry.list().to_vec(),
        });

        let after = self.registry.resolve_or_default(&target).ok().cloned();
        if target != self.preset_id || after != before {
            self.handle_set_preset(&target);
        }
    }

    fn handle_set_offset(&mut self, offset: i64) {
        let preset = match self.registry.resolve_or_default(&self.preset_id) {
            Ok(preset) => preset.clone(),
            Err(e) => {
                self.send_error(&e);
                return;
            }
        };
        match validate_offset(&preset, offset) {
            Ok(offset) => {
                self.start_offset = offset;
                self.bump_generation();
                self.send(PrintUpdate::PresetChanged {
                    preset,
                    start_offset: offset,
                });
            }
            Err(e) => self.send_error(&e),
        }
    }

    fn handle_generate(&mut self) {
        if let Some(running) = &self.in_flight {
            log::debug!("Generation {} already running", running.generation);
            return;
        }
        let preset = match self.registry.resolve_or_default(&self.preset_id) {
            Ok(preset) => preset.clone(),
            Err(e) => {
                self.send_error(&e);
                return;
            }
        };

        let generation = self.generation;
        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let selection = self.selection.clone();
        let sort = self.sort;
        let start_offset = self.start_offset;
        let result_tx = self.result_tx.clone();

        let handle = tokio::spawn(async move {
            let result = pipeline
                .generate_selection(store.as_ref(), &selection, sort, &preset, start_offset)
                .await;
            let _ = result_tx.send(GenerationResult {
                generation,
                preset,
                result,
            });
        });

        self.ready = None;
        self.in_flight = Some(InFlight { generation, handle });
        self.send(PrintUpdate::Generating { generation });
    }

    fn apply_result(&mut self, done: GenerationResult) {
        if done.generation != self.generation {
            log::debug!(
                "Dropping result of generation {}, current is {}",
                done.generation,
                self.generation
            );
            return;
        }
        self.in_flight = None;

        match done.result {
            Ok(batch) => {
                self.send(PrintUpdate::LabelsReady {
                    generation: done.generation,
                    placed: batch.placed_count(),
                    failed: batch.failed_count(),
                });
                self.ready = Some(ReadyBatch {
                    generation: done.generation,
                    preset: done.preset,
                    batch,
                });
            }
            Err(e) => {
                log::error!("Label generation failed: {e}");
                self.send_error(&e);
            }
        }
    }

    async fn handle_export(&mut self, path: PathBuf, format: OutputFormat) {
        if self.in_flight.is_some() {
            self.send_error(&LabelError::Generating);
            return;
        }
        let (preset, batch) = match &self.ready {
            Some(ready) if ready.generation == self.generation => {
                (ready.preset.clone(), ready.batch.clone())
            }
            _ => {
                self.send_error(&LabelError::NothingToPrint);
                return;
            }
        };

        // Bitmaps are only valid on the preset they were sized for
        let sheet = match assemble(&preset, batch) {
            Ok(sheet) => sheet,
            Err(e) => {
                self.send_error(&e);
                return;
            }
        };
        let (pages, labels, failed) =
            (sheet.page_count(), sheet.label_count(), sheet.failed_count());

        match sheet.save(&path, format, self.auto_print).await {
            Ok(()) => {
                self.send(PrintUpdate::Exported {
                    path,
                    pages,
                    labels,
                    failed,
                });
                // A printed selection is done
                self.selection.clear();
                self.selection_changed();
            }
            Err(e) => self.send(PrintUpdate::Error {
                message: format!("Failed to export labels: {e}"),
            }),
        }
    }
}
