//! Application configuration.
//!
//! Stored as `<config_dir>/config.json`. Every field has a default, so a
//! missing file or a partial file both load.
//!
//! ```json
//! {
//!   "serverUrl": "ws://localhost:8000/ws/research",
//!   "apiBaseUrl": "http://localhost:8000",
//!   "reportFormat": "markdown",
//!   "tone": "objective",
//!   "maxUploadBytes": 52428800,
//!   "searchDebounceMs": 300,
//!   "legacyRetryDelayMs": 3000
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::RequestDefaults;

pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws/research";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_LEGACY_RETRY_DELAY_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DossierConfig {
    /// Research WebSocket endpoint.
    pub server_url: String,
    /// Base URL of the document management API.
    pub api_base_url: String,
    /// Where history lives. Relative paths resolve against the config dir.
    /// Defaults to `<config_dir>/data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Protocol log directory. No protocol logs when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub report_format: String,
    pub tone: String,
    pub max_upload_bytes: u64,
    pub search_debounce_ms: u64,
    pub legacy_retry_delay_ms: u64,
}

impl Default for DossierConfig {
    fn default() -> Self {
        let request = RequestDefaults::default();
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: None,
            log_dir: None,
            report_format: request.report_format,
            tone: request.tone,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            legacy_retry_delay_ms: DEFAULT_LEGACY_RETRY_DELAY_MS,
        }
    }
}

impl DossierConfig {
    /// Load `<dir>/config.json`, falling back to defaults when it is absent.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write `<dir>/config.json` atomically.
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE);
        let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));

        let json = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) => resolve(config_dir, dir),
            None => config_dir.join("data"),
        }
    }

    pub fn history_dir(&self, config_dir: &Path) -> PathBuf {
        self.data_dir(config_dir).join("history")
    }

    pub fn log_dir(&self, config_dir: &Path) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| resolve(config_dir, dir))
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            report_format: self.report_format.clone(),
            tone: self.tone.clone(),
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn legacy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.legacy_retry_delay_ms)
    }
}

fn resolve(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}
