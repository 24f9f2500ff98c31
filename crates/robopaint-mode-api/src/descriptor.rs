//! Mode package descriptor.
//!
//! A mode directory carries a `package.json`:
//!
//! ```json
//! {
//!   "name": "robopaint-mode-draw",
//!   "version": "1.0.0",
//!   "robopaint": {
//!     "name": "draw",
//!     "title": "Draw",
//!     "dependencies": ["jquery", "paper"],
//!     "i18n": "dom",
//!     "heavy_library": true
//!   }
//! }
//! ```

use robopaint_core::{BridgeError, BridgeResult, ModeId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the mode package descriptor.
pub const PACKAGE_FILE: &str = "package.json";

/// How a mode's page is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationType {
    /// In-document `data-i18n` markers.
    #[default]
    Native,
    /// Selector map file in the mode's resource directory.
    Dom,
}

/// The `robopaint` section of a mode package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeManifest {
    /// Mode name, used for settings and resource namespacing.
    pub name: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Shared libraries the mode expects.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Translation strategy.
    #[serde(default)]
    pub i18n: TranslationType,
    /// Whether boot waits for the heavy drawing library.
    #[serde(default)]
    pub heavy_library: bool,
}

/// A mode's `package.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModePackage {
    /// Package name.
    pub name: String,
    /// Package version.
    #[serde(default)]
    pub version: String,
    /// Mode section.
    pub robopaint: ModeManifest,
}

/// Identity and declared capabilities of a loaded mode.
///
/// Created once at boot and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    /// Mode identity.
    pub id: ModeId,
    /// Human-readable title, defaulting to the name.
    pub title: String,
    /// Package version.
    pub version: String,
    /// Mode directory.
    pub path: PathBuf,
    /// Declared shared-library dependencies.
    pub dependencies: Vec<String>,
    /// Translation strategy.
    pub translation: TranslationType,
    /// Whether boot waits for the heavy drawing library.
    pub heavy_library: bool,
}

impl ModeDescriptor {
    /// Resolves the descriptor of the mode in `directory`.
    ///
    /// A missing directory, a missing or malformed package file, or an
    /// empty mode name is fatal.
    pub fn load(directory: &Path) -> BridgeResult<Self> {
        if !directory.is_dir() {
            return Err(BridgeError::BasePath(directory.display().to_string()));
        }

        let package_path = directory.join(PACKAGE_FILE);
        let raw = std::fs::read_to_string(&package_path)
            .map_err(|e| BridgeError::descriptor(package_path.display(), e.to_string()))?;
        let package: ModePackage = serde_json::from_str(&raw)
            .map_err(|e| BridgeError::descriptor(package_path.display(), e.to_string()))?;

        Self::from_package(package, directory)
    }

    /// Builds a descriptor from an already parsed package.
    pub fn from_package(package: ModePackage, directory: &Path) -> BridgeResult<Self> {
        let manifest = package.robopaint;
        let name = manifest.name.trim();
        if name.is_empty() {
            return Err(BridgeError::descriptor(
                directory.join(PACKAGE_FILE).display(),
                "robopaint.name must not be empty",
            ));
        }

        Ok(Self {
            id: ModeId::new(name),
            title: manifest.title.unwrap_or_else(|| name.to_string()),
            version: package.version,
            path: directory.to_path_buf(),
            dependencies: manifest.dependencies,
            translation: manifest.i18n,
            heavy_library: manifest.heavy_library,
        })
    }
}
