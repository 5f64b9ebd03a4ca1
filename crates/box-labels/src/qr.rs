//! QR image resolution
//!
//! Items carry a reference to a QR image generated when the box was
//! created. The resolver turns that reference into pixels:
//!
//! - `data:image/...;base64,` URLs
//! - `file://` URLs and plain paths, relative to a base directory
//! - `http(s)://` URLs (with the `remote-qr` feature)
//!
//! Items without a reference can get a QR synthesized locally for their
//! public box URL.

use crate::types::{LabelError, PrintableItem, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GrayImage, Luma};
use qrcode::QrCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Pixels per QR module in synthesized codes
const QR_MODULE_PX: u32 = 8;

/// White border around synthesized codes, in modules
const QR_QUIET_ZONE: u32 = 4;

/// Largest remote image accepted
#[cfg(feature = "remote-qr")]
const MAX_REMOTE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct QrResolver {
    base_dir: PathBuf,
    fallback_base_url: Option<String>,
    timeout: Duration,
}

impl Default for QrResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl QrResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fallback_base_url: None,
            timeout: Duration::from_millis(crate::constants::DEFAULT_RASTER_TIMEOUT_MS),
        }
    }

    /// Synthesize `{base_url}/box/{id}` codes for items without a reference.
    pub fn with_fallback_base_url(mut self, base_url: Option<String>) -> Self {
        self.fallback_base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Public URL encoded in a synthesized code, if fallback is enabled
    pub fn fallback_url(&self, item_id: &str) -> Option<String> {
        self.fallback_base_url
            .as_ref()
            .map(|base| format!("{base}/box/{item_id}"))
    }

    /// Resolve the QR image for `item`, destined for `slot`.
    ///
    /// `Ok(None)` means the label is rendered text-only. Any unreadable or
    /// undecodable reference is a `LabelRenderFailed` for that slot.
    pub async fn resolve(
        &self,
        slot: usize,
        item: &PrintableItem,
    ) -> Result<Option<Arc<DynamicImage>>> {
        let fail = |reason: String| LabelError::LabelRenderFailed { slot, reason };

        let Some(reference) = item.qr_ref() else {
            return match self.fallback_url(&item.id) {
                Some(url) => {
                    let image = tokio::task::spawn_blocking(move || generate_qr(&url))
                        .await?
                        .map_err(fail)?;
                    Ok(Some(Arc::new(image)))
                }
                None => Ok(None),
            };
        };

        let bytes = self.read_reference(reference).await.map_err(fail)?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await?
            .map_err(|e| fail(format!("cannot decode QR image: {e}")))?;
        Ok(Some(Arc::new(image)))
    }

    async fn read_reference(&self, reference: &str) -> std::result::Result<Vec<u8>, String> {
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_url(rest);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self.fetch_remote(reference).await;
        }

        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        let path = Path::new(raw);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))
    }

    #[cfg(feature = "remote-qr")]
    async fn fetch_remote(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        use std::io::Read;

        let url = url.to_string();
        let timeout = self.timeout;
        log::debug!("Fetching QR image {}", url);
        tokio::task::spawn_blocking(move || {
            let agent = ureq::AgentBuilder::new().timeout(timeout).build();
            let response = agent
                .get(&url)
                .call()
                .map_err(|e| format!("cannot fetch {url}: {e}"))?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .take(MAX_REMOTE_BYTES)
                .read_to_end(&mut bytes)
                .map_err(|e| format!("cannot read {url}: {e}"))?;
            Ok(bytes)
        })
        .await
        .map_err(|e| format!("fetch task failed: {e}"))?
    }

    #[cfg(not(feature = "remote-qr"))]
    async fn fetch_remote(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        Err(format!(
            "cannot fetch {url}: built without the remote-qr feature"
        ))
    }
}

fn decode_data_url(rest: &str) -> std::result::Result<Vec<u8>, String> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data URL".to_string())?;
    if !header.starts_with("image/") {
        return Err(format!("data URL is not an image ({header})"));
    }
    if !header.ends_with(";base64") {
        return Err("data URL is not base64 encoded".to_string());
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 in data URL: {e}"))
}

/// Encode `data` as a black-on-white QR image with a quiet zone.
pub fn generate_qr(data: &str) -> std::result::Result<DynamicImage, String> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| format!("QR encode error: {e}"))?;
    let modules = code.to_colors();
    let module_count = code.width() as u32;
    let side = (module_count + QR_QUIET_ZONE * 2) * QR_MODULE_PX;

    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));
    for (i, color) in modules.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let x = (i as u32 % module_count + QR_QUIET_ZONE) * QR_MODULE_PX;
        let y = (i as u32 / module_count + QR_QUIET_ZONE) * QR_MODULE_PX;
        for dy in 0..QR_MODULE_PX {
            for dx in 0..QR_MODULE_PX {
                img.put_pixel(x + dx, y + dy, Luma([0u8]));
            }
        }
    }

    Ok(DynamicImage::ImageLuma8(img))
}
