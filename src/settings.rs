//! Engine settings: a JSON file with every field optional, then environment
//! overrides. Command line flags are applied on top by the binary.

use crate::config::cache::DEFAULT_CACHE_TTL;
use crate::viewer::ViewerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_URL_ENV: &str = "SHOEVIZ_CONFIG_URL";
pub const ASSET_BASE_ENV: &str = "SHOEVIZ_ASSET_BASE";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("settings '{path}' are malformed: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerSettings {
    /// Base URL of the configuration service. Unset means static table only.
    pub config_endpoint: Option<String>,
    /// URL or directory candidate paths are resolved against.
    pub asset_base: String,
    pub cache_ttl_seconds: u64,
    pub frame_interval_ms: u64,
    pub probe_timeout_seconds: u64,
    pub surface_width: u32,
    pub surface_height: u32,
    pub generate_default_on_miss: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            config_endpoint: None,
            asset_base: "public".to_string(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
            frame_interval_ms: 16,
            probe_timeout_seconds: 10,
            surface_width: 800,
            surface_height: 600,
            generate_default_on_miss: false,
        }
    }
}

impl ViewerSettings {
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// File settings when `path` is given, defaults otherwise, then the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        if let Some(endpoint) = value(CONFIG_URL_ENV) {
            log::debug!("{} overrides configuration endpoint", CONFIG_URL_ENV);
            self.config_endpoint = Some(endpoint);
        }
        if let Some(base) = value(ASSET_BASE_ENV) {
            log::debug!("{} overrides asset base", ASSET_BASE_ENV);
            self.asset_base = base;
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds.max(1))
    }

    pub fn viewer_options(&self) -> ViewerOptions {
        ViewerOptions {
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
        }
    }
}
