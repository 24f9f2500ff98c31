//! Durable key-value backends for settings documents.

use parking_lot::Mutex;
use robopaint_core::{BridgeError, BridgeResult};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key-value store holding raw settings documents.
///
/// Documents are opaque JSON strings. All operations are synchronous so a
/// write has completed before the next change handler can run.
pub trait SettingsBackend: Send + Sync {
    /// Reads a raw document.
    ///
    /// Returns `None` if the key doesn't exist.
    fn read(&self, key: &str) -> BridgeResult<Option<String>>;

    /// Writes a raw document, replacing any previous one.
    fn write(&self, key: &str, document: &str) -> BridgeResult<()>;

    /// Removes a document.
    ///
    /// Returns `true` if the key existed and was removed.
    fn remove(&self, key: &str) -> BridgeResult<bool>;
}

/// Stores each document as `<directory>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> BridgeResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| {
            BridgeError::storage(format!("Failed to create settings directory {}: {}", directory.display(), e))
        })?;
        Ok(Self { directory })
    }

    /// Returns the backing directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.json", safe))
    }
}

impl SettingsBackend for FileBackend {
    fn read(&self, key: &str) -> BridgeResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::storage(format!("Failed to read settings '{}': {}", key, e))),
        }
    }

    fn write(&self, key: &str, document: &str) -> BridgeResult<()> {
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, document)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|e| BridgeError::storage(format!("Failed to write settings '{}': {}", key, e)))?;
        debug!(key, path = %path.display(), "Settings written");
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BridgeError::storage(format!("Failed to remove settings '{}': {}", key, e))),
        }
    }
}

/// In-memory backend, for tests and for modes that must not persist.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.documents.lock().get(key).cloned())
    }

    fn write(&self, key: &str, document: &str) -> BridgeResult<()> {
        self.documents.lock().insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.documents.lock().remove(key).is_some())
    }
}
