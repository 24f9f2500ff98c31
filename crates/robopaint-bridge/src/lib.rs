//! # RoboPaint Bridge
//!
//! Runs the draw mode as a child process of the host. The host writes IPC
//! messages as JSON lines to stdin and reads the mode's messages from
//! stdout; logs go to stderr.

use async_trait::async_trait;
use robopaint_config::BridgeConfig;
use robopaint_core::BridgeResult;
use robopaint_draw_mode::{page, DrawMode};
use robopaint_mode_api::ModeState;
use robopaint_mode_runtime::{boot, BootOptions, DeviceInfoSource, HostChannel, Prerequisites};
use robopaint_settings::{FileBackend, SettingsBackend};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Device capabilities taken from the `[device]` configuration table.
#[derive(Debug, Clone)]
pub struct ConfiguredDevice {
    capabilities: Value,
}

impl ConfiguredDevice {
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            capabilities: Value::Object(config.device.clone()),
        }
    }
}

#[async_trait]
impl DeviceInfoSource for ConfiguredDevice {
    async fn fetch(&self) -> BridgeResult<Value> {
        Ok(self.capabilities.clone())
    }
}

/// Boots the draw mode and runs it until the close is acknowledged or the
/// host hangs up.
pub async fn run_mode<T: HostChannel>(config: &BridgeConfig, transport: T) -> BridgeResult<ModeState> {
    let options = BootOptions::from_config(config);
    let backend: Arc<dyn SettingsBackend> = Arc::new(FileBackend::new(config.storage.directory.clone())?);
    let prerequisites = Prerequisites {
        device: Arc::new(ConfiguredDevice::from_config(config)),
        library: None,
    };

    let mode = DrawMode::new();
    let mut coordinator = boot(&options, backend, &prerequisites, page(), mode.callbacks(), transport).await?;
    coordinator.start();
    let state = coordinator.run().await?;
    info!(%state, "Mode finished");
    Ok(state)
}
