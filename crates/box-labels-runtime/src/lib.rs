use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

mod logger;
mod worker;

pub use logger::{AppLogger, LogEntry};
pub use worker::{SessionConfig, print_worker};

// Re-export types from the library crate
pub use box_labels::{
    LabelError, LabelPipeline, LabelPreset, OutputFormat, PresetRegistry, PrintOptions,
    SelectionOrder, UserSettings,
};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error("Print worker has stopped")]
    WorkerClosed,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Commands sent from the front-end to the print worker
#[derive(Debug)]
pub enum PrintCommand {
    ToggleItem {
        id: String,
    },
    ClearSelection,
    SetPreset {
        preset_id: String,
    },
    /// First slot to fill on the first sheet
    SetStartOffset {
        offset: i64,
    },
    MergeUserSettings {
        settings: UserSettings,
    },
    Generate,
    Export {
        path: PathBuf,
        format: OutputFormat,
    },
    Shutdown,
}

/// Updates sent from the print worker to the front-end
#[derive(Debug, Clone)]
pub enum PrintUpdate {
    SelectionChanged {
        selected: Vec<String>,
    },
    PresetChanged {
        preset: LabelPreset,
        start_offset: usize,
    },
    PresetsListed {
        presets: Vec<LabelPreset>,
    },
    Generating {
        generation: GenerationId,
    },
    LabelsReady {
        generation: GenerationId,
        placed: usize,
        failed: usize,
    },
    Exported {
        path: PathBuf,
        pages: usize,
        labels: usize,
        failed: usize,
    },
    /// Results of an outdated generation were dropped
    Discarded {
        generation: GenerationId,
    },
    Error {
        message: String,
    },
}

/// Counter identifying one state of selection, preset and offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GenerationId(pub u64);

impl GenerationId {
    pub fn next(self) -> Self {
        GenerationId(self.0 + 1)
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sending half used by front-ends
#[derive(Debug, Clone)]
pub struct PrintClient {
    command_tx: mpsc::UnboundedSender<PrintCommand>,
}

impl PrintClient {
    pub fn new(command_tx: mpsc::UnboundedSender<PrintCommand>) -> Self {
        Self { command_tx }
    }

    pub fn send(&self, command: PrintCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| RuntimeError::WorkerClosed)
    }
}
