//! The namespaced settings document of one mode.

use crate::SettingsBackend;
use robopaint_core::{BridgeResult, ModeId};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings store shared between the mode API and bound controls.
pub type SharedSettings = Rc<RefCell<SettingsStore>>;

/// In-memory copy of a mode's settings document plus its backend.
///
/// Every mutation through [`SettingsStore::set`] or
/// [`SettingsStore::remove`] is persisted before returning, so memory is at
/// most one failed write ahead of storage.
pub struct SettingsStore {
    mode: ModeId,
    backend: Arc<dyn SettingsBackend>,
    values: Map<String, Value>,
}

impl SettingsStore {
    /// Creates an empty store for `mode`. Call [`SettingsStore::load`] to
    /// read the persisted document.
    pub fn new(mode: ModeId, backend: Arc<dyn SettingsBackend>) -> Self {
        Self {
            mode,
            backend,
            values: Map::new(),
        }
    }

    /// Wraps the store for sharing with change handlers.
    #[must_use]
    pub fn shared(self) -> SharedSettings {
        Rc::new(RefCell::new(self))
    }

    /// Returns the mode this store belongs to.
    #[must_use]
    pub const fn mode(&self) -> &ModeId {
        &self.mode
    }

    /// Replaces the in-memory document with the persisted one.
    ///
    /// A missing, unreadable or malformed document loads as empty.
    pub fn load(&mut self) {
        let key = self.mode.settings_key();
        self.values = match self.backend.read(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    warn!(key = %key, kind = json_kind(&other), "Settings document is not an object, starting empty");
                    Map::new()
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Malformed settings document, starting empty");
                    Map::new()
                }
            },
            Ok(None) => Map::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "Settings document unreadable, starting empty");
                Map::new()
            }
        };
        debug!(mode = %self.mode, keys = self.values.len(), "Settings loaded");
    }

    /// Persists the in-memory document.
    pub fn save(&self) -> BridgeResult<()> {
        let raw = serde_json::to_string(&self.values)?;
        self.backend.write(&self.mode.settings_key(), &raw)
    }

    /// Removes the persisted document and empties memory.
    pub fn clear(&mut self) -> BridgeResult<()> {
        self.values.clear();
        let existed = self.backend.remove(&self.mode.settings_key())?;
        debug!(mode = %self.mode, existed, "Settings cleared");
        Ok(())
    }

    /// Returns a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Sets a value and persists the whole document.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> BridgeResult<()> {
        self.values.insert(key.into(), value);
        self.save()
    }

    /// Removes a value and persists the whole document.
    pub fn remove(&mut self, key: &str) -> BridgeResult<Option<Value>> {
        let previous = self.values.remove(key);
        if previous.is_some() {
            self.save()?;
        }
        Ok(previous)
    }

    /// Returns the in-memory document.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("mode", &self.mode)
            .field("keys", &self.values.len())
            .finish_non_exhaustive()
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
