//! Binding of page form controls to settings keys.

use crate::SharedSettings;
use robopaint_dom::{ControlKind, Document, NodeId};
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, warn};

/// Listener slot used for settings persistence, so re-binding a control
/// replaces its handler instead of stacking a second one.
const SETTINGS_SLOT: &str = "settings";

/// A control bound to a settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    /// Settings key, taken from the control's element id.
    pub key: String,
    /// Element carrying the binding.
    pub node: NodeId,
    /// How the control exposes its value.
    pub kind: ControlKind,
}

/// Binds every control matched by `selectors` to the settings store.
///
/// Each control is keyed by its element id. The stored value, if any, is
/// applied to the control, a change handler that writes the full value
/// and persists is installed, and one change event is fired so the store
/// and any dependent UI agree from the start. Radio groups are bound
/// through their container. Controls without an id, incompatible elements
/// and unparsable selectors are logged and skipped.
///
/// Calling this again with the same selectors re-applies the bindings
/// without stacking handlers.
pub fn manage(settings: &SharedSettings, doc: &mut Document, selectors: &[&str]) -> Vec<BindingEntry> {
    let mut entries = Vec::new();

    for selector in selectors {
        let nodes = match doc.select(selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(selector, error = %e, "Skipping settings selector");
                continue;
            }
        };
        if nodes.is_empty() {
            debug!(selector, "Settings selector matched no controls");
        }

        for node in nodes {
            if let Some(entry) = bind_control(settings, doc, node) {
                entries.push(entry);
            }
        }
    }

    entries
}

fn bind_control(settings: &SharedSettings, doc: &mut Document, node: NodeId) -> Option<BindingEntry> {
    let element = doc.element(node);
    let tag = element.tag().to_string();
    let Some(key) = element.id().map(str::to_string) else {
        warn!(tag = %tag, "Form control has no id and cannot be bound to a setting");
        return None;
    };

    let kind = doc.control_kind(node);
    if kind == ControlKind::Incompatible {
        warn!(key = %key, tag = %tag, "Incompatible form control skipped");
        return None;
    }

    let stored = settings.borrow().get(&key).cloned();
    if let Some(value) = stored {
        if !doc.set_control_value(node, &value) {
            warn!(key = %key, value = %value, "Stored setting does not fit its control");
        }
    }

    let store = Rc::clone(settings);
    let handler_key = key.clone();
    doc.set_change_listener(node, SETTINGS_SLOT, move |value: &Value| {
        // An unselected radio group has nothing worth persisting.
        if value.is_null() {
            return;
        }
        if let Err(e) = store.borrow_mut().set(handler_key.clone(), value.clone()) {
            warn!(key = %handler_key, error = %e, "Failed to persist setting");
        }
    });

    doc.trigger_change(node);
    debug!(key = %key, kind = ?kind, "Control bound to setting");

    Some(BindingEntry { key, node, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, SettingsBackend, SettingsStore};
    use robopaint_core::ModeId;
    use serde_json::json;
    use std::sync::Arc;

    struct Page {
        doc: Document,
        speed: NodeId,
        fill: NodeId,
        quality: NodeId,
    }

    fn page() -> Page {
        let mut doc = Document::new();
        let body = doc.body();
        let form = doc.append_element(body, "form", &[("id", "settings")]);
        let speed = doc.append_element(form, "input", &[("id", "speed"), ("type", "range"), ("value", "50")]);
        let fill = doc.append_element(form, "input", &[("id", "fill"), ("type", "checkbox"), ("class", "bound")]);
        let quality = doc.append_element(form, "div", &[("id", "quality"), ("class", "bound")]);
        doc.append_element(quality, "input", &[("type", "radio"), ("name", "q"), ("value", "low"), ("checked", "")]);
        doc.append_element(quality, "input", &[("type", "radio"), ("name", "q"), ("value", "high")]);
        doc.append_element(form, "p", &[("id", "note"), ("class", "bound")]);
        doc.append_element(form, "input", &[("class", "bound")]);
        Page { doc, speed, fill, quality }
    }

    fn settings(backend: &Arc<MemoryBackend>) -> SharedSettings {
        let mut store = SettingsStore::new(ModeId::new("draw"), Arc::clone(backend) as Arc<dyn SettingsBackend>);
        store.load();
        store.shared()
    }

    fn persisted(backend: &MemoryBackend) -> Value {
        serde_json::from_str(&backend.read("draw-settings").unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_first_run_persists_defaults() {
        let backend = Arc::new(MemoryBackend::new());
        let settings = settings(&backend);
        let mut page = page();

        let entries = manage(&settings, &mut page.doc, &["#speed", ".bound"]);

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["speed", "fill", "quality"]);
        assert_eq!(persisted(&backend), json!({"speed": "50", "fill": false, "quality": "low"}));
    }

    #[test]
    fn test_stored_values_are_applied() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .write("draw-settings", r#"{"speed":"80","fill":true,"quality":"high"}"#)
            .unwrap();
        let settings = settings(&backend);
        let mut page = page();

        manage(&settings, &mut page.doc, &["#speed", "#fill", "#quality"]);

        assert_eq!(page.doc.control_value(page.speed), Some(json!("80")));
        assert_eq!(page.doc.control_value(page.fill), Some(json!(true)));
        assert_eq!(page.doc.control_value(page.quality), Some(json!("high")));
    }

    #[test]
    fn test_changes_round_trip_through_load() {
        let backend = Arc::new(MemoryBackend::new());
        let settings = settings(&backend);
        let mut page = page();
        manage(&settings, &mut page.doc, &["#speed", "#fill", "#quality"]);

        page.doc.user_input(page.speed, &json!("12"));
        page.doc.user_input(page.fill, &json!(true));
        page.doc.user_input(page.quality, &json!("high"));

        let mut reloaded = SettingsStore::new(ModeId::new("draw"), Arc::clone(&backend) as Arc<dyn SettingsBackend>);
        reloaded.load();
        assert_eq!(reloaded.get("speed"), Some(&json!("12")));
        assert_eq!(reloaded.get("fill"), Some(&json!(true)));
        assert_eq!(reloaded.get("quality"), Some(&json!("high")));
    }

    #[test]
    fn test_manage_twice_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let settings = settings(&backend);
        let mut page = page();
        let selectors = ["#speed", ".bound"];

        manage(&settings, &mut page.doc, &selectors);
        let after_first = persisted(&backend);
        manage(&settings, &mut page.doc, &selectors);

        assert_eq!(persisted(&backend), after_first);
        assert_eq!(page.doc.listener_count(page.speed), 1);
    }

    #[test]
    fn test_bad_selector_is_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        let settings = settings(&backend);
        let mut page = page();

        let entries = manage(&settings, &mut page.doc, &["#speed >", "#missing", "#speed"]);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ControlKind::Text);
    }
}
