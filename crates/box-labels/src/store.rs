//! Item and user-settings stores
//!
//! The print pipeline only reads from these. Item records come from any
//! [`ItemStore`]; the custom preset lives in a user-settings JSON file.

use crate::preset::CustomPresetSettings;
use crate::types::{LabelError, PrintableItem, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Batch read of item records by id.
///
/// Records may come back in any order and may include ids that were not
/// asked for. Failures surface as `ItemFetchFailed`.
pub trait ItemStore: Send + Sync {
    fn fetch_items(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<PrintableItem>>> + Send;
}

fn keep_requested(items: Vec<PrintableItem>, ids: &[String]) -> Vec<PrintableItem> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    items
        .into_iter()
        .filter(|item| wanted.contains(item.id.as_str()))
        .collect()
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryItemStore {
    items: Vec<PrintableItem>,
}

impl MemoryItemStore {
    pub fn new(items: Vec<PrintableItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[PrintableItem] {
        &self.items
    }
}

impl ItemStore for MemoryItemStore {
    async fn fetch_items(&self, ids: &[String]) -> Result<Vec<PrintableItem>> {
        Ok(keep_requested(self.items.clone(), ids))
    }
}

// =============================================================================
// File store (JSON array or CSV)
// =============================================================================

/// Reads item records from a `.json` or `.csv` file on every fetch
#[derive(Debug, Clone)]
pub struct FileItemStore {
    path: PathBuf,
}

impl FileItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    /// Every record in the file
    pub async fn load_all(&self) -> Result<Vec<PrintableItem>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| fetch_failed(&self.path, e))?;

        let is_csv = self.is_csv();
        let parsed = tokio::task::spawn_blocking(move || {
            if is_csv {
                parse_csv(&contents)
            } else {
                serde_json::from_str::<Vec<PrintableItem>>(&contents).map_err(LabelError::from)
            }
        })
        .await?;

        let items = parsed.map_err(|e| fetch_failed(&self.path, e))?;
        log::debug!("Loaded {} item(s) from {}", items.len(), self.path.display());
        Ok(items)
    }
}

impl ItemStore for FileItemStore {
    async fn fetch_items(&self, ids: &[String]) -> Result<Vec<PrintableItem>> {
        let items = self.load_all().await?;
        Ok(keep_requested(items, ids))
    }
}

fn fetch_failed(path: &Path, err: impl std::fmt::Display) -> LabelError {
    LabelError::ItemFetchFailed(format!("{}: {err}", path.display()))
}

/// Column lookup tolerant of both naming schemes
struct CsvColumns {
    id: usize,
    number: usize,
    destination: Option<usize>,
    qr: Option<usize>,
    fragile: Option<usize>,
}

impl CsvColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let id = find(&["id", "_id"])
            .ok_or_else(|| LabelError::Config("CSV is missing an id column".to_string()))?;
        let number = find(&["number", "display_code", "displayCode"])
            .ok_or_else(|| LabelError::Config("CSV is missing a number column".to_string()))?;
        Ok(Self {
            id,
            number,
            destination: find(&["destination", "destination_label", "destinationLabel"]),
            qr: find(&["qrcode_url", "qrcodeURL", "qr_image_ref", "qrImageRef"]),
            fragile: find(&["fragile", "is_fragile", "isFragile"]),
        })
    }
}

fn parse_csv(contents: &str) -> Result<Vec<PrintableItem>> {
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    let columns = CsvColumns::from_headers(reader.headers()?)?;
    let mut items = Vec::new();

    for result in reader.records() {
        let record = result?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim);

        let id = field(Some(columns.id)).unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        let qr = field(columns.qr).filter(|s| !s.is_empty());
        items.push(PrintableItem {
            id: id.to_string(),
            display_code: field(Some(columns.number)).unwrap_or_default().to_string(),
            destination_label: field(columns.destination).unwrap_or_default().to_string(),
            qr_image_ref: qr.map(str::to_string),
            is_fragile: field(columns.fragile).is_some_and(parse_flag),
        });
    }
    Ok(items)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "x"
    )
}

// =============================================================================
// User settings
// =============================================================================

/// The external user-settings document. Keys other than the print settings
/// are preserved on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(
        rename = "printSettings",
        alias = "print_settings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub print_settings: Option<CustomPresetSettings>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// User settings persisted as a JSON file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. A missing file yields empty settings.
    pub async fn load_user_settings(&self) -> Result<UserSettings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No user settings at {}", self.path.display());
                Ok(UserSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_user_settings(&self, settings: &UserSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        log::info!("Saved user settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_filters_ids() {
        let store = MemoryItemStore::new(vec![
            PrintableItem::new("1", "BOX-001"),
            PrintableItem::new("2", "BOX-002"),
        ]);
        let items = store.fetch_items(&["2".to_string()]).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_code, "BOX-002");
    }

    #[test]
    fn test_parse_csv_wire_names() {
        let csv = "id,number,destination,qrcode_url,fragile\n\
                   a,BOX-001,Kitchen,qr/a.png,true\n\
                   b,BOX-002,,,\n";
        let items = parse_csv(csv).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].destination_label, "Kitchen");
        assert_eq!(items[0].qr_image_ref.as_deref(), Some("qr/a.png"));
        assert!(items[0].is_fragile);
        assert_eq!(items[1].qr_image_ref, None);
        assert!(!items[1].is_fragile);
    }

    #[test]
    fn test_parse_csv_requires_id() {
        assert!(parse_csv("number\nBOX-001\n").is_err());
    }

    #[test]
    fn test_json_wire_names() {
        let json = r#"[{"_id":"a","number":"BOX-001","destination":"Attic",
            "qrcodeURL":"q.png","fragile":true}]"#;
        let items: Vec<PrintableItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].destination_label, "Attic");
        assert!(items[0].is_fragile);
    }

    #[test]
    fn test_user_settings_keeps_other_keys() {
        let json = r#"{"theme":"dark","printSettings":{"rows":3}}"#;
        let settings: UserSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.print_settings.as_ref().and_then(|p| p.rows), Some(3));
        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["theme"], "dark");
        assert_eq!(back["printSettings"]["rows"], 3);
    }
}
