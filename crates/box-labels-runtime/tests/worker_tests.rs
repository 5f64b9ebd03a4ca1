use box_labels::render::LabelSurface;
use box_labels::{
    CustomPresetSettings, LabelBitmap, LabelPipeline, MemoryItemStore, PrintableItem, QrResolver,
    Rasterize, SurfaceRasterizer,
};
use box_labels_runtime::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct SlowRasterizer {
    delay: Duration,
    inner: SurfaceRasterizer,
}

impl Rasterize for SlowRasterizer {
    fn rasterize(&self, surface: &LabelSurface) -> box_labels::Result<LabelBitmap> {
        std::thread::sleep(self.delay);
        self.inner.rasterize(surface)
    }
}

struct Harness {
    client: PrintClient,
    updates: mpsc::UnboundedReceiver<PrintUpdate>,
    worker: tokio::task::JoinHandle<()>,
}

fn spawn_worker(delay_ms: u64) -> Harness {
    spawn_worker_with(delay_ms, SessionConfig::default())
}

fn spawn_worker_with(delay_ms: u64, config: SessionConfig) -> Harness {
    let items: Vec<PrintableItem> = (1..=6)
        .map(|i| {
            PrintableItem::new(format!("box-{i}"), format!("BOX-{i:03}")).with_destination("Cellar")
        })
        .collect();
    let store = Arc::new(MemoryItemStore::new(items));
    let rasterizer = SlowRasterizer {
        delay: Duration::from_millis(delay_ms),
        inner: SurfaceRasterizer::default(),
    };
    let pipeline = Arc::new(LabelPipeline::new(Arc::new(rasterizer), QrResolver::default()));

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, updates) = mpsc::unbounded_channel();
    let worker = tokio::spawn(print_worker(
        command_rx,
        update_tx,
        store,
        pipeline,
        config,
    ));
    Harness {
        client: PrintClient::new(command_tx),
        updates,
        worker,
    }
}

/// Next update matching `pred`, skipping the others
async fn wait_for(
    updates: &mut mpsc::UnboundedReceiver<PrintUpdate>,
    pred: impl Fn(&PrintUpdate) -> bool,
) -> PrintUpdate {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let update = updates.recv().await.expect("worker stopped");
            if pred(&update) {
                return update;
            }
        }
    })
    .await
    .expect("timed out waiting for update")
}

fn is_error(update: &PrintUpdate) -> bool {
    matches!(update, PrintUpdate::Error { .. })
}

#[tokio::test]
async fn test_generate_then_export_clears_selection() {
    let mut h = spawn_worker(0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.pdf");

    for id in ["box-2", "box-5", "box-1"] {
        h.client.send(PrintCommand::ToggleItem { id: id.to_string() }).unwrap();
    }
    h.client.send(PrintCommand::SetStartOffset { offset: 22 }).unwrap();
    h.client.send(PrintCommand::Generate).unwrap();

    let ready = wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::LabelsReady { .. })).await;
    let PrintUpdate::LabelsReady { placed, failed, .. } = ready else {
        unreachable!()
    };
    assert_eq!((placed, failed), (3, 0));

    h.client
        .send(PrintCommand::Export {
            path: path.clone(),
            format: OutputFormat::Pdf,
        })
        .unwrap();
    let exported = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::Exported { .. }) || is_error(u)
    })
    .await;
    match exported {
        // Slots 22, 23 and 24 span two sheets of 24
        PrintUpdate::Exported { pages, labels, failed, .. } => {
            assert_eq!((pages, labels, failed), (2, 3, 0));
        }
        other => panic!("unexpected update {other:?}"),
    }
    assert!(path.exists());

    let cleared = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::SelectionChanged { .. })
    })
    .await;
    assert!(matches!(cleared, PrintUpdate::SelectionChanged { selected } if selected.is_empty()));

    h.client.send(PrintCommand::Shutdown).unwrap();
    h.worker.await.unwrap();
}

#[tokio::test]
async fn test_export_without_labels_is_refused() {
    let mut h = spawn_worker(0);
    let dir = tempfile::tempdir().unwrap();

    h.client
        .send(PrintCommand::Export {
            path: dir.path().join("never.pdf"),
            format: OutputFormat::Pdf,
        })
        .unwrap();
    let error = wait_for(&mut h.updates, is_error).await;
    let PrintUpdate::Error { message } = error else {
        unreachable!()
    };
    assert_eq!(message, LabelError::NothingToPrint.to_string());
    assert!(!dir.path().join("never.pdf").exists());
}

#[tokio::test]
async fn test_export_while_generating_is_refused() {
    let mut h = spawn_worker(300);
    let dir = tempfile::tempdir().unwrap();

    h.client.send(PrintCommand::ToggleItem { id: "box-1".to_string() }).unwrap();
    h.client.send(PrintCommand::Generate).unwrap();
    h.client
        .send(PrintCommand::Export {
            path: dir.path().join("early.pdf"),
            format: OutputFormat::Pdf,
        })
        .unwrap();

    let error = wait_for(&mut h.updates, is_error).await;
    let PrintUpdate::Error { message } = error else {
        unreachable!()
    };
    assert_eq!(message, LabelError::Generating.to_string());

    // The generation still completes afterwards
    wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::LabelsReady { .. })).await;
}

#[tokio::test]
async fn test_stale_generation_is_discarded() {
    let mut h = spawn_worker(200);

    h.client.send(PrintCommand::ToggleItem { id: "box-1".to_string() }).unwrap();
    h.client.send(PrintCommand::Generate).unwrap();
    let PrintUpdate::Generating { generation: first } =
        wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::Generating { .. })).await
    else {
        unreachable!()
    };

    // Selection changes while the first run is still rasterizing
    h.client.send(PrintCommand::ToggleItem { id: "box-2".to_string() }).unwrap();
    let discarded = wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::Discarded { .. })).await;
    assert!(matches!(discarded, PrintUpdate::Discarded { generation } if generation == first));

    h.client.send(PrintCommand::Generate).unwrap();
    let ready = wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::LabelsReady { .. })).await;
    match ready {
        PrintUpdate::LabelsReady { generation, placed, .. } => {
            assert!(generation > first);
            assert_eq!(placed, 2);
        }
        other => panic!("unexpected update {other:?}"),
    }
}

#[tokio::test]
async fn test_queued_generates_are_coalesced() {
    let mut h = spawn_worker(50);

    h.client.send(PrintCommand::ToggleItem { id: "box-3".to_string() }).unwrap();
    for _ in 0..5 {
        h.client.send(PrintCommand::Generate).unwrap();
    }
    h.client.send(PrintCommand::Shutdown).unwrap();
    h.worker.await.unwrap();

    let mut generating = 0;
    while let Ok(update) = h.updates.try_recv() {
        if matches!(update, PrintUpdate::Generating { .. }) {
            generating += 1;
        }
    }
    assert_eq!(generating, 1);
}

#[tokio::test]
async fn test_invalid_offset_keeps_state() {
    let mut h = spawn_worker(0);

    h.client.send(PrintCommand::SetStartOffset { offset: -1 }).unwrap();
    let error = wait_for(&mut h.updates, is_error).await;
    assert!(matches!(error, PrintUpdate::Error { message } if message.contains("-1")));

    h.client.send(PrintCommand::SetStartOffset { offset: 3 }).unwrap();
    let changed = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::PresetChanged { start_offset: 3, .. })
    })
    .await;
    assert!(matches!(changed, PrintUpdate::PresetChanged { .. }));
}

fn two_by_two_settings() -> UserSettings {
    UserSettings {
        print_settings: Some(CustomPresetSettings {
            rows: Some(2),
            cols: Some(2),
            label_width_cm: Some(8.0),
            label_height_cm: Some(4.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_merged_custom_preset_is_selected() {
    let mut h = spawn_worker(0);

    h.client
        .send(PrintCommand::MergeUserSettings {
            settings: two_by_two_settings(),
        })
        .unwrap();

    let changed = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::PresetChanged { preset, .. } if preset.id == "custom")
    })
    .await;
    let PrintUpdate::PresetChanged { preset, start_offset } = changed else {
        unreachable!()
    };
    assert_eq!(preset.total_slots(), 4);
    assert_eq!(start_offset, 0);

    // Unknown ids fall back to the default preset
    h.client.send(PrintCommand::SetPreset { preset_id: "gone".to_string() }).unwrap();
    let fallback = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::PresetChanged { preset, .. } if preset.id != "custom")
    })
    .await;
    assert!(matches!(
        fallback,
        PrintUpdate::PresetChanged { preset, .. } if preset.id == box_labels::DEFAULT_PRESET_ID
    ));
}

#[tokio::test]
async fn test_merge_that_changes_preset_invalidates_labels() {
    // "custom" is not registered yet, so the session starts on the default preset
    let config = SessionConfig {
        preset_id: "custom".to_string(),
        ..SessionConfig::default()
    };
    let mut h = spawn_worker_with(0, config);
    let dir = tempfile::tempdir().unwrap();

    for id in ["box-1", "box-2", "box-3"] {
        h.client.send(PrintCommand::ToggleItem { id: id.to_string() }).unwrap();
    }
    h.client.send(PrintCommand::SetStartOffset { offset: 10 }).unwrap();
    h.client.send(PrintCommand::Generate).unwrap();
    let ready = wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::LabelsReady { .. })).await;
    assert!(matches!(ready, PrintUpdate::LabelsReady { placed: 3, .. }));

    h.client
        .send(PrintCommand::MergeUserSettings {
            settings: two_by_two_settings(),
        })
        .unwrap();
    let changed = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::PresetChanged { preset, .. } if preset.id == "custom")
    })
    .await;
    // Slot 10 does not exist on a 2x2 sheet
    assert!(matches!(changed, PrintUpdate::PresetChanged { start_offset: 0, .. }));

    h.client
        .send(PrintCommand::Export {
            path: dir.path().join("stale.pdf"),
            format: OutputFormat::Pdf,
        })
        .unwrap();
    let update = wait_for(&mut h.updates, |u| {
        matches!(u, PrintUpdate::Exported { .. }) || is_error(u)
    })
    .await;
    let refused = LabelError::NothingToPrint.to_string();
    assert!(
        matches!(&update, PrintUpdate::Error { message } if *message == refused),
        "unexpected update {update:?}"
    );
    assert!(!dir.path().join("stale.pdf").exists());

    // Regenerating lays the labels out on the custom sheet
    h.client.send(PrintCommand::Generate).unwrap();
    wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::LabelsReady { placed: 3, .. })).await;
    h.client
        .send(PrintCommand::Export {
            path: dir.path().join("custom.pdf"),
            format: OutputFormat::Pdf,
        })
        .unwrap();
    let exported = wait_for(&mut h.updates, |u| matches!(u, PrintUpdate::Exported { .. })).await;
    assert!(matches!(exported, PrintUpdate::Exported { pages: 1, labels: 3, .. }));
}
