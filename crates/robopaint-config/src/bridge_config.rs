//! Bridge configuration structures.

use robopaint_core::telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Root bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Application metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Where the mode and its resources live.
    #[serde(default)]
    pub mode: ModeConfig,

    /// Language selection.
    #[serde(default)]
    pub i18n: I18nConfig,

    /// Settings persistence.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Device capabilities reported to the mode when the host does not
    /// provide its own.
    #[serde(default)]
    pub device: Map<String, Value>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "robopaint".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Mode location configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Directory holding the mode's `package.json`.
    pub directory: PathBuf,
    /// Directory holding the shared (`common`) resource files.
    pub shared_resources: PathBuf,
    /// Name of the resource subdirectory inside the mode directory.
    pub resource_dir_name: String,
    /// Suffix marking a mode-local file as a DOM map rather than a translation.
    pub map_suffix: String,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./modes/draw"),
            shared_resources: PathBuf::from("./resources/_i18n"),
            resource_dir_name: "_i18n".to_string(),
            map_suffix: ".map.json".to_string(),
        }
    }
}

impl ModeConfig {
    /// Returns the mode-local resource directory.
    #[must_use]
    pub fn local_resources(&self) -> PathBuf {
        self.directory.join(&self.resource_dir_name)
    }
}

/// Language configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Active language code.
    pub language: String,
    /// Language consulted when a key is missing from the active one.
    pub fallback_language: Option<String>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            fallback_language: Some("en-US".to_string()),
        }
    }
}

/// Settings persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the settings documents are written to.
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/settings"),
        }
    }
}
