use anyhow::{Context, Result, bail};
use box_labels::{
    FileItemStore, LabelPipeline, LengthUnit, OutputFormat, PresetRegistry,
    PrintOptions, PrintSelection, SelectionOrder, SettingsStore, UserSettings, place_all_pages,
    validate_offset,
};
use box_labels_runtime::{
    AppLogger, PrintClient, PrintCommand, PrintUpdate, SessionConfig, print_worker,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "smbl", about = "Scan My Boxes label sheets", version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List label sheet presets
    Presets {
        /// User settings file holding a custom preset
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Show which slot each box lands in
    Layout {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Preset id
        #[arg(long)]
        preset: Option<String>,

        /// First slot to fill on the first sheet
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        start: i64,

        /// User settings file holding a custom preset
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Generate a printable label sheet
    Print {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output file (PDF or HTML)
        #[arg(short, long)]
        output: PathBuf,

        /// Preset id
        #[arg(long)]
        preset: Option<String>,

        /// First slot to fill on the first sheet
        #[arg(long, allow_hyphen_values = true)]
        start: Option<i64>,

        /// Output format (defaults to the output file extension)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// User settings file holding a custom preset
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Print options JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// TrueType font for label text
        #[arg(long)]
        font: Option<PathBuf>,

        /// Label order
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Oversampling when rasterizing labels
        #[arg(long)]
        pixel_ratio: Option<f32>,

        /// Layout width in CSS pixels
        #[arg(long)]
        width: Option<f32>,

        /// Per-label time limit
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Generate QR codes for boxes without one, pointing at {URL}/box/{id}
        #[arg(long)]
        qr_base_url: Option<String>,

        /// Directory relative QR image paths are resolved against
        #[arg(long)]
        qr_dir: Option<PathBuf>,

        /// Do not open the print dialog when the HTML page loads
        #[arg(long)]
        no_auto_print: bool,
    },

    /// Manage the custom preset
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Manage print option files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Box records (JSON array or CSV)
    #[arg(short, long)]
    items: PathBuf,

    /// Comma-separated box ids to print (default: every box in the file)
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Create or update the custom preset in a user settings file
    Set {
        #[arg(long)]
        settings: PathBuf,

        /// Unit of all lengths below
        #[arg(long, default_value = "cm", value_enum)]
        unit: UnitArg,

        #[arg(long)]
        rows: usize,

        #[arg(long)]
        cols: usize,

        /// Label width
        #[arg(long)]
        width: f32,

        /// Label height
        #[arg(long)]
        height: f32,

        #[arg(long)]
        margin_top: Option<f32>,

        #[arg(long)]
        margin_left: Option<f32>,

        #[arg(long)]
        gutter_x: Option<f32>,

        #[arg(long)]
        gutter_y: Option<f32>,

        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write default print options
    Init {
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Html,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Insertion,
    Code,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Cm,
    Mm,
    In,
    Pt,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pdf => Self::Pdf,
            FormatArg::Html => Self::Html,
        }
    }
}

impl From<SortArg> for SelectionOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Insertion => Self::Insertion,
            SortArg::Code => Self::DisplayCode,
        }
    }
}

impl From<UnitArg> for LengthUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Cm => Self::Cm,
            UnitArg::Mm => Self::Mm,
            UnitArg::In => Self::In,
            UnitArg::Pt => Self::Pt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    AppLogger::new(1000)
        .with_level(level)
        .with_stderr(true)
        .init()
        .context("Failed to install logger")?;

    match cli.command {
        Commands::Presets { settings } => {
            let (registry, custom) = load_registry(settings.as_deref()).await?;
            let selected = choose_preset(None, custom, PrintOptions::default().preset_id);
            for preset in registry.list() {
                let marker = if preset.id == selected { "*" } else { " " };
                println!(
                    "{marker} {:<18} {:>3} slots ({}x{}) {:.2} x {:.2} cm  {}",
                    preset.id,
                    preset.total_slots(),
                    preset.rows,
                    preset.cols,
                    preset.label_width,
                    preset.label_height,
                    preset.name
                );
            }
        }

        Commands::Layout {
            selection,
            preset,
            start,
            settings,
        } => {
            let (registry, custom) = load_registry(settings.as_deref()).await?;
            let preset_id = choose_preset(preset, custom, PrintOptions::default().preset_id);
            let preset = registry.resolve_or_default(&preset_id)?;
            let start = validate_offset(preset, start)?;

            let store = FileItemStore::new(&selection.items);
            let all = store.load_all().await?;
            let chosen = select(&selection.select, &all);
            let items = chosen.order_items(all, SelectionOrder::Insertion)?;

            let pages = place_all_pages(preset, &items, start)?;
            println!(
                "{}: {} item(s) on {} page(s), starting at slot {}",
                preset.name,
                items.len(),
                pages.len(),
                start
            );
            for page in &pages {
                println!("Page {}", page.index + 1);
                for row in page.slots.chunks(preset.cols) {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|slot| match slot {
                            Some(item) => format!("{:<12}", item.display_code),
                            None => format!("{:<12}", "."),
                        })
                        .collect();
                    println!("  {}", cells.join(" ").trim_end());
                }
            }
        }

        Commands::Print {
            selection,
            output,
            preset,
            start,
            format,
            settings,
            config,
            font,
            sort,
            pixel_ratio,
            width,
            timeout_ms,
            qr_base_url,
            qr_dir,
            no_auto_print,
        } => {
            let mut options = match &config {
                Some(path) => PrintOptions::load(path)
                    .await
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => PrintOptions::default(),
            };
            if let Some(sort) = sort {
                options.sort = sort.into();
            }
            if let Some(ratio) = pixel_ratio {
                options.render.pixel_ratio = ratio;
            }
            if let Some(width) = width {
                options.render.available_width_px = width;
            }
            if let Some(timeout_ms) = timeout_ms {
                options.raster.timeout_ms = timeout_ms;
            }
            if font.is_some() {
                options.font_path = font;
            }
            if qr_base_url.is_some() {
                options.qr_fallback_base_url = qr_base_url;
            }
            options.qr_base_dir = qr_dir
                .or(options.qr_base_dir)
                .or_else(|| selection.items.parent().map(Path::to_path_buf));
            if no_auto_print {
                options.auto_print = false;
            }
            options.output_format = match format {
                Some(format) => format.into(),
                None if has_extension(&output, OutputFormat::Html.extension())
                    || has_extension(&output, "htm") =>
                {
                    OutputFormat::Html
                }
                None => options.output_format,
            };
            let mut output = output;
            if output.extension().is_none() {
                output.set_extension(options.output_format.extension());
            }
            options.validate()?;

            let (registry, custom) = load_registry(settings.as_deref()).await?;
            options.preset_id = choose_preset(preset, custom, options.preset_id);
            let store = FileItemStore::new(&selection.items);
            let all = store.load_all().await?;
            let ids = select(&selection.select, &all);
            if ids.is_empty() {
                bail!("No boxes selected");
            }

            let pipeline = LabelPipeline::from_options(&options).await?;
            let format = options.output_format;
            let config = SessionConfig::from_options(&options, registry);
            run_print_session(store, pipeline, config, &ids, start, output, format).await?;
        }

        Commands::Preset {
            command:
                PresetCommands::Set {
                    settings,
                    unit,
                    rows,
                    cols,
                    width,
                    height,
                    margin_top,
                    margin_left,
                    gutter_x,
                    gutter_y,
                    name,
                },
        } => {
            let unit = LengthUnit::from(unit);
            let store = SettingsStore::new(&settings);
            let mut user = store.load_user_settings().await?;

            let mut custom = user.print_settings.take().unwrap_or_default();
            custom.rows = Some(rows);
            custom.cols = Some(cols);
            custom.label_width_cm = Some(unit.to_cm(width));
            custom.label_height_cm = Some(unit.to_cm(height));
            let to_cm = |value: Option<f32>| value.map(|v| unit.to_cm(v));
            custom.margin_top_cm = to_cm(margin_top).or(custom.margin_top_cm);
            custom.margin_left_cm = to_cm(margin_left).or(custom.margin_left_cm);
            custom.gutter_x_cm = to_cm(gutter_x).or(custom.gutter_x_cm);
            custom.gutter_y_cm = to_cm(gutter_y).or(custom.gutter_y_cm);
            if name.is_some() {
                custom.name = name;
            }

            let preset = custom.to_preset();
            preset.validate()?;
            if !preset.fits_page(box_labels::PageSize::A4) {
                log::warn!("Preset {} extends past an A4 page", preset.id);
            }
            user.print_settings = Some(custom);
            store.save_user_settings(&user).await?;
            println!(
                "Saved preset {} ({}x{}, {:.2} x {:.2} {}) to {}",
                preset.id,
                preset.rows,
                preset.cols,
                unit.from_cm(preset.label_width),
                unit.from_cm(preset.label_height),
                unit.name(),
                settings.display()
            );
        }

        Commands::Config {
            command: ConfigCommands::Init { file, force },
        } => {
            if file.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", file.display());
            }
            PrintOptions::default().save(&file).await?;
            println!("Wrote default print options to {}", file.display());
        }
    }

    Ok(())
}

/// Built-in presets plus the custom one from `settings`, with the custom id if any
async fn load_registry(settings: Option<&Path>) -> Result<(PresetRegistry, Option<String>)> {
    let mut registry = PresetRegistry::builtin();
    let mut custom = None;
    if let Some(path) = settings {
        let user: UserSettings = SettingsStore::new(path).load_user_settings().await?;
        custom = registry.merge_settings(user.print_settings.as_ref());
    }
    Ok((registry, custom))
}

/// `--preset` wins, then the user's custom preset, then the configured one
fn choose_preset(explicit: Option<String>, custom: Option<String>, configured: String) -> String {
    explicit.or(custom).unwrap_or(configured)
}

/// Explicit ids, or every record in file order
fn select(ids: &[String], all: &[box_labels::PrintableItem]) -> PrintSelection {
    let explicit: Vec<&str> = ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).collect();
    if explicit.is_empty() {
        all.iter().map(|item| item.id.clone()).collect()
    } else {
        explicit.into_iter().collect()
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Drive the print worker from selection to exported file.
async fn run_print_session(
    store: FileItemStore,
    pipeline: LabelPipeline<box_labels::SurfaceRasterizer>,
    config: SessionConfig,
    ids: &PrintSelection,
    start: Option<i64>,
    output: PathBuf,
    format: OutputFormat,
) -> Result<()> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, mut updates) = mpsc::unbounded_channel();
    let worker = tokio::spawn(print_worker(
        command_rx,
        update_tx,
        Arc::new(store),
        Arc::new(pipeline),
        config,
    ));
    let client = PrintClient::new(command_tx);

    for id in ids.ids() {
        client.send(PrintCommand::ToggleItem { id: id.clone() })?;
    }
    if let Some(offset) = start {
        client.send(PrintCommand::SetStartOffset { offset })?;
    }
    client.send(PrintCommand::Generate)?;

    let (placed, failed) = loop {
        match updates.recv().await {
            Some(PrintUpdate::LabelsReady { placed, failed, .. }) => break (placed, failed),
            Some(PrintUpdate::Error { message }) => {
                let _ = client.send(PrintCommand::Shutdown);
                bail!(message);
            }
            Some(_) => {}
            None => bail!("Print worker stopped unexpectedly"),
        }
    };
    if failed > 0 {
        eprintln!("warning: {failed} label(s) failed and will be left blank");
    }

    client.send(PrintCommand::Export { path: output, format })?;
    let result = loop {
        match updates.recv().await {
            Some(PrintUpdate::Exported {
                path,
                pages,
                labels,
                failed,
            }) => {
                println!(
                    "Placed {labels} label(s) on {pages} page(s), {failed} failed → {}",
                    path.display()
                );
                break Ok(());
            }
            Some(PrintUpdate::Error { message }) => break Err(anyhow::anyhow!(message)),
            Some(_) => {}
            None => break Err(anyhow::anyhow!("Print worker stopped unexpectedly")),
        }
    };

    let _ = client.send(PrintCommand::Shutdown);
    worker.await.context("Print worker panicked")?;
    log::debug!("Generated {placed} label(s) before export");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_preset_chosen_without_flag() {
        let configured = box_labels::DEFAULT_PRESET_ID.to_string();
        assert_eq!(
            choose_preset(None, Some("custom".to_string()), configured.clone()),
            "custom"
        );
        assert_eq!(
            choose_preset(
                Some("herma-4452".to_string()),
                Some("custom".to_string()),
                configured.clone()
            ),
            "herma-4452"
        );
        assert_eq!(choose_preset(None, None, configured.clone()), configured);
    }

    #[tokio::test]
    async fn test_load_registry_reports_custom_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"printSettings": {"rows": 2, "cols": 5}}"#).unwrap();

        let (registry, custom) = load_registry(Some(&path)).await.unwrap();
        assert_eq!(custom.as_deref(), Some(box_labels::CUSTOM_PRESET_ID));
        assert_eq!(registry.resolve("custom").unwrap().total_slots(), 10);

        let (_, none) = load_registry(None).await.unwrap();
        assert!(none.is_none());
    }
}
