//! Mode boot sequence.
//!
//! Descriptor, resources and settings are resolved first, then the device
//! capability fetch and the optional heavy library load run concurrently.
//! The resulting [`Coordinator`] is still `Initializing`: call
//! [`Coordinator::start`] once the page is ready.

use crate::context::ModeParts;
use crate::{Coordinator, HostChannel, ModeCallbacks};
use async_trait::async_trait;
use robopaint_config::BridgeConfig;
use robopaint_core::{BridgeError, BridgeResult};
use robopaint_dom::Document;
use robopaint_i18n::{ResourceSources, TranslationStrategy, Translator};
use robopaint_mode_api::{ModeDescriptor, TranslationType};
use robopaint_settings::{SettingsBackend, SettingsStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Fetches the device capabilities from the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceInfoSource: Send + Sync {
    async fn fetch(&self) -> BridgeResult<Value>;
}

/// Loads the heavy drawing library some modes depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryLoader: Send + Sync {
    async fn load(&self) -> BridgeResult<()>;
}

/// External work the boot sequence waits for.
#[derive(Clone)]
pub struct Prerequisites {
    pub device: Arc<dyn DeviceInfoSource>,
    /// Only awaited when the mode declares a heavy library.
    pub library: Option<Arc<dyn LibraryLoader>>,
}

impl std::fmt::Debug for Prerequisites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prerequisites")
            .field("library", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

/// Paths and language selection for one boot.
#[derive(Debug, Clone)]
pub struct BootOptions {
    pub mode_dir: PathBuf,
    pub shared_resources: PathBuf,
    pub resource_dir_name: String,
    pub map_suffix: String,
    pub language: String,
    pub fallback_language: Option<String>,
}

impl BootOptions {
    /// Takes the mode and language sections of the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            mode_dir: config.mode.directory.clone(),
            shared_resources: config.mode.shared_resources.clone(),
            resource_dir_name: config.mode.resource_dir_name.clone(),
            map_suffix: config.mode.map_suffix.clone(),
            language: config.i18n.language.clone(),
            fallback_language: config.i18n.fallback_language.clone(),
        }
    }
}

/// Waits for the device capabilities and, when `library` is given, the
/// heavy library. Both run concurrently; either failing fails the boot.
pub async fn join_prerequisites(
    device: &dyn DeviceInfoSource,
    library: Option<&dyn LibraryLoader>,
) -> BridgeResult<Value> {
    let library_load = async {
        match library {
            Some(loader) => loader.load().await,
            None => Ok(()),
        }
    };

    let (device, library) = tokio::join!(device.fetch(), library_load);
    library.map_err(|e| prerequisite("heavy library", e))?;
    let device = device.map_err(|e| prerequisite("device capabilities", e))?;
    debug!("Boot prerequisites resolved");
    Ok(device)
}

fn prerequisite(name: &'static str, error: BridgeError) -> BridgeError {
    match error {
        BridgeError::Prerequisite { .. } => error,
        other => BridgeError::Prerequisite {
            name,
            message: other.to_string(),
        },
    }
}

/// Boots a mode up to the point where its page may be shown.
///
/// `document` is the mode's page as rendered; it must not be marked ready
/// yet. Descriptor and prerequisite failures abort the boot; resource and
/// settings problems are logged and the mode boots with what loaded.
pub async fn boot<T: HostChannel>(
    options: &BootOptions,
    backend: Arc<dyn SettingsBackend>,
    prerequisites: &Prerequisites,
    document: Document,
    callbacks: ModeCallbacks,
    transport: T,
) -> BridgeResult<Coordinator<T>> {
    let descriptor = ModeDescriptor::load(&options.mode_dir)?;
    info!(mode = %descriptor.id, version = %descriptor.version, "Booting mode");

    let sources = ResourceSources::new(
        descriptor.id.clone(),
        options.shared_resources.clone(),
        descriptor.path.join(&options.resource_dir_name),
    )
    .with_map_suffix(&options.map_suffix);
    let resources = sources.build().await;
    let strategy = match descriptor.translation {
        TranslationType::Dom => TranslationStrategy::DomMap(sources.load_dom_map().await),
        TranslationType::Native => TranslationStrategy::Native,
    };

    let mut store = SettingsStore::new(descriptor.id.clone(), backend);
    store.load();

    let library = if descriptor.heavy_library {
        let Some(loader) = prerequisites.library.as_deref() else {
            return Err(BridgeError::Prerequisite {
                name: "heavy library",
                message: "mode requires a heavy library but no loader was provided".to_string(),
            });
        };
        Some(loader)
    } else {
        None
    };
    let device = join_prerequisites(prerequisites.device.as_ref(), library).await?;

    let translator = Translator::new(
        descriptor.id.clone(),
        Arc::new(resources),
        strategy,
        options.language.clone(),
        options.fallback_language.clone(),
    );

    Ok(Coordinator::new(
        ModeParts {
            descriptor,
            document,
            settings: store.shared(),
            translator,
            device,
        },
        callbacks,
        transport,
    ))
}
