//! Configuration loader with layered sources.

use crate::BridgeConfig;
use config::{Config, ConfigError, Environment, File};
use robopaint_core::BridgeError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with runtime reload support.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    config: Arc<RwLock<BridgeConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables with `ROBOPAINT__` prefix
    pub fn new(config_dir: impl Into<String>) -> Result<Self, BridgeError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, BridgeError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> BridgeConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    pub async fn reload(&self) -> Result<(), BridgeError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<BridgeConfig, BridgeError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment = std::env::var("ROBOPAINT_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config layer from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ROBOPAINT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_bridge_error)?;

        let bridge_config: BridgeConfig = config
            .try_deserialize()
            .map_err(config_error_to_bridge_error)?;

        Self::validate_config(&bridge_config)?;

        Ok(bridge_config)
    }

    /// Validates the configuration.
    fn validate_config(config: &BridgeConfig) -> Result<(), BridgeError> {
        if config.mode.directory.as_os_str().is_empty() {
            return Err(BridgeError::Configuration("Mode directory is required".to_string()));
        }

        if config.i18n.language.trim().is_empty() {
            return Err(BridgeError::Configuration("Language is required".to_string()));
        }

        if config.mode.map_suffix.is_empty() {
            return Err(BridgeError::Configuration("Map file suffix must not be empty".to_string()));
        }

        if config.i18n.fallback_language.as_deref() == Some(config.i18n.language.as_str()) {
            debug!("Fallback language equals the active language: {}", config.i18n.language);
        }

        Ok(())
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_bridge_error(err: ConfigError) -> BridgeError {
    BridgeError::Configuration(err.to_string())
}
