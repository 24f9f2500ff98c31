//! Resource discovery and merging.
//!
//! Every resource file is a JSON object declaring its language in
//! `_meta.target`:
//!
//! ```json
//! { "_meta": { "target": "en-US" }, "hello": "Hi" }
//! ```
//!
//! Shared files become the `common` subtree of their language, mode-local
//! files the `modes.<mode>` subtree. Files ending in the map suffix are DOM
//! maps and never enter the tree.

use crate::DomMap;
use robopaint_core::{BridgeError, BridgeResult, ModeId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Merged translations, keyed by language code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTree {
    languages: BTreeMap<String, Map<String, Value>>,
}

impl ResourceTree {
    /// Returns the language codes present in the tree.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    /// Returns the whole subtree of a language.
    #[must_use]
    pub fn language(&self, code: &str) -> Option<&Map<String, Value>> {
        self.languages.get(code)
    }

    /// Resolves a dotted key such as `common.hello` to a string.
    ///
    /// Non-string leaves and intermediate objects do not resolve.
    #[must_use]
    pub fn get(&self, language: &str, key: &str) -> Option<&str> {
        let mut parts = key.split('.');
        let mut current = self.languages.get(language)?.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        current.as_str()
    }

    /// Sets the `common` subtree of a language, replacing any earlier one.
    pub fn insert_common(&mut self, code: &str, content: Map<String, Value>) {
        self.languages
            .entry(code.to_string())
            .or_default()
            .insert("common".to_string(), Value::Object(content));
    }

    /// Sets the `modes.<mode>` subtree of a language.
    pub fn insert_mode(&mut self, code: &str, mode: &ModeId, content: Map<String, Value>) {
        let modes = self
            .languages
            .entry(code.to_string())
            .or_default()
            .entry("modes")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(modes) = modes {
            modes.insert(mode.as_str().to_string(), Value::Object(content));
        }
    }
}

/// Where the resource files of a mode come from.
#[derive(Debug, Clone)]
pub struct ResourceSources {
    /// Mode whose local resources land under `modes.<mode>`.
    pub mode: ModeId,
    /// Shared resource directory.
    pub shared_dir: PathBuf,
    /// Mode-local resource directory.
    pub local_dir: PathBuf,
    /// File name suffix marking a DOM map.
    pub map_suffix: String,
}

impl ResourceSources {
    /// Creates sources with the conventional `.map.json` map suffix.
    pub fn new(mode: ModeId, shared_dir: impl Into<PathBuf>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            shared_dir: shared_dir.into(),
            local_dir: local_dir.into(),
            map_suffix: ".map.json".to_string(),
        }
    }

    /// Overrides the map file suffix.
    #[must_use]
    pub fn with_map_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.map_suffix = suffix.into();
        self
    }

    fn is_map_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.map_suffix))
    }

    /// Builds the whole resource tree.
    ///
    /// A file that cannot be read, parsed, or that lacks a language
    /// declaration is logged and skipped. Missing directories yield no
    /// files.
    pub async fn build(&self) -> ResourceTree {
        let mut tree = ResourceTree::default();

        for path in list_json_files(&self.shared_dir).await {
            if let Some((code, content)) = read_resource(&path).await {
                if tree.language(&code).and_then(|l| l.get("common")).is_some() {
                    debug!(language = %code, path = %path.display(), "Shared resource replaces an earlier file");
                }
                tree.insert_common(&code, content);
            }
        }

        for path in list_json_files(&self.local_dir).await {
            if self.is_map_file(&path) {
                continue;
            }
            if let Some((code, content)) = read_resource(&path).await {
                tree.insert_mode(&code, &self.mode, content);
            }
        }

        info!(
            mode = %self.mode,
            languages = tree.languages.len(),
            "Resource tree built"
        );
        tree
    }

    /// Loads and merges every DOM map in the mode-local directory.
    ///
    /// Later files override earlier selectors. Unparsable maps are logged
    /// and skipped.
    pub async fn load_dom_map(&self) -> DomMap {
        let mut map = DomMap::default();
        for path in list_json_files(&self.local_dir).await {
            if !self.is_map_file(&path) {
                continue;
            }
            match read_json(&path).await.and_then(|value| DomMap::from_value(&path, value)) {
                Ok(loaded) => map.extend(loaded),
                Err(e) => warn!(error = %e, "Skipping DOM map"),
            }
        }
        debug!(mode = %self.mode, rules = map.len(), "DOM map loaded");
        map
    }
}

async fn list_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Resource directory not readable");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Stopped listing resource directory");
                break;
            }
        }
    }
    // Directory order is platform dependent; "last file wins" needs a stable order.
    files.sort();
    files
}

async fn read_json(path: &Path) -> BridgeResult<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BridgeError::resource(path.display(), e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| BridgeError::resource(path.display(), e.to_string()))
}

async fn read_resource(path: &Path) -> Option<(String, Map<String, Value>)> {
    let parsed = read_json(path).await.and_then(|value| split_meta(path, value));
    match parsed {
        Ok(resource) => Some(resource),
        Err(e) => {
            warn!(error = %e, "Skipping resource file");
            None
        }
    }
}

fn split_meta(path: &Path, value: Value) -> BridgeResult<(String, Map<String, Value>)> {
    let Value::Object(mut content) = value else {
        return Err(BridgeError::resource(path.display(), "resource file is not an object"));
    };
    let code = content
        .remove("_meta")
        .and_then(|meta| meta.get("target").and_then(Value::as_str).map(str::to_string))
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| BridgeError::resource(path.display(), "missing _meta.target language code"))?;
    Ok((code, content))
}
