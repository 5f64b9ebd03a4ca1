use box_labels::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_print_options_save_load() {
    let temp = NamedTempFile::new().unwrap();
    let path = temp.path();

    let options = PrintOptions {
        preset_id: "herma-4452".to_string(),
        start_offset: 4,
        sort: SelectionOrder::DisplayCode,
        output_format: OutputFormat::Html,
        qr_fallback_base_url: Some("https://boxes.example".to_string()),
        ..Default::default()
    };
    options.save(path).await.unwrap();

    let loaded = PrintOptions::load(path).await.unwrap();
    assert_eq!(loaded, options);
}

#[tokio::test]
async fn test_print_options_bad_json() {
    let temp = NamedTempFile::new().unwrap();
    std::fs::write(temp.path(), "{ not json").unwrap();
    assert!(matches!(
        PrintOptions::load(temp.path()).await,
        Err(LabelError::Config(_))
    ));
}

#[tokio::test]
async fn test_missing_settings_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    let settings = store.load_user_settings().await.unwrap();
    assert_eq!(settings, UserSettings::default());
}

#[tokio::test]
async fn test_custom_preset_round_trip_into_registry() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));

    let custom = LabelPreset {
        id: CUSTOM_PRESET_ID.to_string(),
        name: "Shelf tags".to_string(),
        rows: 5,
        cols: 2,
        label_width: LengthUnit::Mm.to_cm(90.0),
        label_height: LengthUnit::Mm.to_cm(50.0),
        margin_top: 1.0,
        margin_left: 1.0,
        gutter_x: 0.5,
        gutter_y: 0.3,
    };
    let settings = UserSettings {
        print_settings: Some(CustomPresetSettings::from_preset(&custom)),
        ..Default::default()
    };
    store.save_user_settings(&settings).await.unwrap();

    let loaded = store.load_user_settings().await.unwrap();
    let mut registry = PresetRegistry::builtin();
    let builtin_count = registry.list().len();
    let id = registry.merge_settings(loaded.print_settings.as_ref());
    assert_eq!(id.as_deref(), Some(CUSTOM_PRESET_ID));

    // Merging again never duplicates
    registry.merge_settings(loaded.print_settings.as_ref());
    assert_eq!(registry.list().len(), builtin_count + 1);

    let resolved = registry.resolve(CUSTOM_PRESET_ID).unwrap();
    assert_eq!(resolved.total_slots(), 10);
    assert!((resolved.label_width - 9.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_partial_custom_settings_use_defaults() {
    let temp = NamedTempFile::new().unwrap();
    std::fs::write(
        temp.path(),
        r#"{"language":"fr","printSettings":{"rows":2,"cols":0,"labelWidthCm":4}}"#,
    )
    .unwrap();
    let settings = SettingsStore::new(temp.path())
        .load_user_settings()
        .await
        .unwrap();

    let preset = settings.print_settings.as_ref().unwrap().to_preset();
    assert_eq!(preset.id, CUSTOM_PRESET_ID);
    assert_eq!(preset.rows, 2);
    assert_eq!(preset.label_height, 1.0);

    // Explicit zero columns survives the merge and fails at resolution
    let mut registry = PresetRegistry::builtin();
    registry.merge_settings(settings.print_settings.as_ref());
    assert!(matches!(
        registry.resolve(CUSTOM_PRESET_ID),
        Err(LabelError::InvalidPreset(_))
    ));
    assert!(matches!(
        registry.resolve_or_default(CUSTOM_PRESET_ID),
        Err(LabelError::InvalidPreset(_))
    ));
}

#[test]
fn test_unknown_preset_falls_back_to_default() {
    let registry = PresetRegistry::builtin();
    assert!(matches!(
        registry.resolve("no-such-sheet"),
        Err(LabelError::NotFound(_))
    ));
    let preset = registry.resolve_or_default("no-such-sheet").unwrap();
    assert_eq!(preset.id, DEFAULT_PRESET_ID);
}

#[tokio::test]
async fn test_file_store_reads_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxes.csv");
    std::fs::write(
        &path,
        "id,number,destination,qrcode_url,fragile\n\
         a,BOX-001,Kitchen,,true\n\
         b,BOX-002,Garage,,false\n",
    )
    .unwrap();

    let store = FileItemStore::new(&path);
    let items = store.fetch_items(&["b".to_string()]).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].display_code, "BOX-002");
    assert_eq!(store.load_all().await.unwrap().len(), 2);
}
