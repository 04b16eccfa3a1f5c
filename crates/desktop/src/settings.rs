use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use maskwatch_core::session::capture_session::SessionConfig;
use maskwatch_core::shared::constants::{
    CAPTURE_INTERVAL_MS, DEFAULT_ENDPOINT, DEFAULT_JPEG_QUALITY, REQUEST_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    /// libavdevice input format; platform default when unset.
    pub input_format: Option<String>,
    pub device: Option<String>,
    /// Image or video file used instead of a camera.
    pub input: Option<PathBuf>,
    pub interval_ms: u64,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            input_format: None,
            device: None,
            input: None,
            interval_ms: CAPTURE_INTERVAL_MS,
            timeout_secs: REQUEST_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("MaskWatch").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(path, json) {
                log::warn!("Could not save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            interval: Duration::from_millis(self.interval_ms.max(1)),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
