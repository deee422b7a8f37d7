//! Configuration management
//!
//! Settings live in `<dir>/settings.json`:
//! ```json
//! {
//!   "engine": { "previewRows": 10, "maxFileSizeBytes": 10485760, "commitBatchSize": 50 },
//!   "backend": { "baseUrl": "https://api.example.com/v1", "timeoutSecs": 30 },
//!   "importTemplates": [ ... ],
//!   "exportTemplates": [ ... ]
//! }
//! ```
//! Keys this module does not manage are written back untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::domain::result::{Error, Result};
use crate::domain::TargetSchema;

pub const SETTINGS_FILE: &str = "settings.json";
pub const API_URL_ENV: &str = "LEDGERPORT_API_URL";

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Records kept for the mapping preview
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Records per commit batch
    #[serde(default = "default_commit_batch_size")]
    pub commit_batch_size: usize,
    /// Replaces the built-in target schema when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_fields: Option<TargetSchema>,
}

fn default_preview_rows() -> usize {
    10
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_commit_batch_size() -> usize {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            max_file_size_bytes: default_max_file_size(),
            commit_batch_size: default_commit_batch_size(),
            target_fields: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Ledgerport configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub engine: EngineConfig,
    pub backend: BackendConfig,
    // Whole settings file, kept so unmanaged keys survive a save
    raw: Map<String, serde_json::Value>,
}

impl Config {
    /// Load config from the data directory.
    ///
    /// A missing file gives defaults. `LEDGERPORT_API_URL` overrides
    /// `backend.baseUrl`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(dir)?;
        config.apply_api_url(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    fn load_file(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        let raw: Map<String, serde_json::Value> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("{} is not valid JSON: {}", path.display(), e)))?
            }
        } else {
            Map::new()
        };

        let engine = section(&raw, "engine")?;
        let backend = section(&raw, "backend")?;
        Ok(Self { engine, backend, raw })
    }

    /// Apply an API URL override; blank values are ignored
    pub fn apply_api_url(&mut self, url: Option<String>) {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.backend.base_url = Some(url);
        }
    }

    /// Save config to the data directory, preserving every other key
    /// (including stored templates written since this config was loaded)
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SETTINGS_FILE);
        let mut settings = match Self::load_file(dir) {
            Ok(current) => current.raw,
            Err(_) => self.raw.clone(),
        };
        settings.insert("engine".to_string(), serde_json::to_value(&self.engine)?);
        settings.insert("backend".to_string(), serde_json::to_value(&self.backend)?);

        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
        Ok(())
    }

    /// Target schema in effect
    pub fn schema(&self) -> TargetSchema {
        self.engine.target_fields.clone().unwrap_or_default()
    }
}

fn section<T: serde::de::DeserializeOwned + Default>(
    raw: &Map<String, serde_json::Value>,
    key: &str,
) -> Result<T> {
    match raw.get(key) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| Error::Config(format!("Invalid \"{}\" settings: {}", key, e))),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.engine.preview_rows, 10);
        assert_eq!(config.engine.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.engine.commit_batch_size, 50);
        assert_eq!(config.backend.timeout_secs, 30);
        assert!(config.backend.base_url.is_none());
        assert_eq!(config.schema(), TargetSchema::default());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"engine":{"previewRows":3},"backend":{"baseUrl":"http://localhost:8080"}}"#,
        )
        .unwrap();
        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.engine.preview_rows, 3);
        assert_eq!(config.engine.commit_batch_size, 50);
        assert_eq!(config.backend.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme":"dark","importTemplates":[]}"#,
        )
        .unwrap();
        let mut config = Config::load_file(dir.path()).unwrap();
        config.engine.commit_batch_size = 5;
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw["theme"], "dark");
        assert!(raw["importTemplates"].is_array());
        assert_eq!(raw["engine"]["commitBatchSize"], 5);
    }

    #[test]
    fn test_api_url_override() {
        let mut config = Config::default();
        config.apply_api_url(Some("  ".to_string()));
        assert!(config.backend.base_url.is_none());
        config.apply_api_url(Some("https://api.example.com".to_string()));
        assert_eq!(config.backend.base_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        assert!(matches!(Config::load_file(dir.path()), Err(Error::Config(_))));
    }
}
