//! Selector-to-key translation maps.
//!
//! A DOM map is a JSON object whose keys are selectors. A string value is
//! the translation key for the matched elements' direct text; an object
//! value maps attribute names to keys, with `text` standing for the direct
//! text. Keys starting with `_` are metadata.
//!
//! Rules apply in file order, so when two selectors match the same element
//! the later rule wins.
//!
//! ```json
//! {
//!   "#title": "modes.draw.title",
//!   "#start": { "text": "modes.draw.start", "title": "modes.draw.start_hint" }
//! }
//! ```

use robopaint_core::{BridgeError, BridgeResult};
use robopaint_dom::{Document, SelectorList};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Pseudo-attribute naming the direct text node.
pub const TEXT_TARGET: &str = "text";

/// What to translate on the elements a selector matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapRule {
    /// Replace the direct text with this key's translation.
    Text(String),
    /// Set each attribute to its key's translation.
    Attributes(BTreeMap<String, String>),
}

/// A parsed DOM map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomMap {
    rules: Vec<(String, MapRule)>,
}

impl DomMap {
    /// Parses a map from its JSON value. `origin` is only used in errors.
    pub fn from_value(origin: &Path, value: Value) -> BridgeResult<Self> {
        let Value::Object(entries) = value else {
            return Err(BridgeError::resource(origin.display(), "DOM map is not an object"));
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (selector, rule) in entries {
            if selector.starts_with('_') {
                continue;
            }
            let rule = match rule {
                Value::String(key) => MapRule::Text(key),
                Value::Object(attrs) => {
                    let mut targets = BTreeMap::new();
                    for (attr, key) in attrs {
                        match key {
                            Value::String(key) => {
                                targets.insert(attr, key);
                            }
                            other => warn!(selector = %selector, attr = %attr, value = %other, "DOM map key is not a string"),
                        }
                    }
                    MapRule::Attributes(targets)
                }
                other => {
                    warn!(selector = %selector, value = %other, "Unsupported DOM map rule");
                    continue;
                }
            };
            rules.push((selector, rule));
        }
        Ok(Self { rules })
    }

    /// Adds the rules of `other`. A rule for a selector already present
    /// replaces it in place; new selectors are appended.
    pub fn extend(&mut self, other: Self) {
        for (selector, rule) in other.rules {
            match self.rules.iter_mut().find(|(existing, _)| *existing == selector) {
                Some(slot) => slot.1 = rule,
                None => self.rules.push((selector, rule)),
            }
        }
    }

    /// Returns the rule for `selector`.
    #[must_use]
    pub fn rule(&self, selector: &str) -> Option<&MapRule> {
        self.rules.iter().find(|(s, _)| s == selector).map(|(_, rule)| rule)
    }

    /// Returns the number of selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the map has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the map, resolving keys with `lookup`.
    ///
    /// Only direct text nodes and attributes change; child elements are
    /// never removed or reordered. A selector matching nothing is reported
    /// and skipped. Returns the number of elements updated.
    pub fn apply(&self, doc: &mut Document, lookup: impl Fn(&str) -> String) -> usize {
        let mut updated = 0;
        for (selector, rule) in &self.rules {
            let nodes = match SelectorList::parse(selector) {
                Ok(parsed) => doc.select_parsed(&parsed),
                Err(e) => {
                    warn!(error = %e, "Skipping DOM map selector");
                    continue;
                }
            };
            if nodes.is_empty() {
                debug!(selector = %selector, "DOM map selector matched no elements");
                continue;
            }

            for node in nodes {
                match rule {
                    MapRule::Text(key) => doc.set_direct_text(node, &lookup(key)),
                    MapRule::Attributes(targets) => {
                        for (attr, key) in targets {
                            let text = lookup(key);
                            if attr == TEXT_TARGET {
                                doc.set_direct_text(node, &text);
                            } else {
                                doc.set_attr(node, attr, text);
                            }
                        }
                    }
                }
                updated += 1;
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robopaint_dom::Node;
    use serde_json::json;

    fn lookup(key: &str) -> String {
        match key {
            "modes.draw.title" => "Zeichnen".to_string(),
            "modes.draw.start" => "Los".to_string(),
            "modes.draw.hint" => "Startet".to_string(),
            other => other.to_string(),
        }
    }

    #[test]
    fn test_parse_skips_metadata_and_bad_rules() {
        let map = DomMap::from_value(
            Path::new("draw.map.json"),
            json!({
                "_meta": {"target": "de"},
                "#title": "modes.draw.title",
                "#start": {"text": "modes.draw.start", "title": "modes.draw.hint", "bad": 3},
                "#odd": 7
            }),
        )
        .unwrap();

        assert_eq!(map.len(), 2);
        let mut expected = BTreeMap::new();
        expected.insert("text".to_string(), "modes.draw.start".to_string());
        expected.insert("title".to_string(), "modes.draw.hint".to_string());
        assert_eq!(map.rule("#start"), Some(&MapRule::Attributes(expected)));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = DomMap::from_value(Path::new("x.map.json"), json!(["#a"])).unwrap_err();
        assert_eq!(err.error_code(), "RESOURCE_ERROR");
    }

    #[test]
    fn test_apply_preserves_child_elements() {
        let mut doc = Document::new();
        let body = doc.body();
        let title = doc.append_element(body, "h1", &[("id", "title")]);
        doc.append_text(title, "Draw");
        let icon = doc.append_element(title, "img", &[("src", "pen.svg")]);
        let badge = doc.append_element(title, "span", &[("class", "badge")]);
        doc.append_text(badge, "beta");

        let map = DomMap::from_value(Path::new("m"), json!({"#title": "modes.draw.title"})).unwrap();
        assert_eq!(map.apply(&mut doc, lookup), 1);

        let children = doc.element(title).children();
        assert_eq!(children[0], Node::Text("Zeichnen".to_string()));
        assert_eq!(children[1], Node::Element(icon));
        assert_eq!(children[2], Node::Element(badge));
        assert_eq!(doc.text_content(badge), "beta");
    }

    #[test]
    fn test_apply_attributes_and_multiple_matches() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.append_element(body, "button", &[("class", "start")]);
        doc.append_text(first, "Start");
        let second = doc.append_element(body, "button", &[("class", "start")]);

        let map = DomMap::from_value(
            Path::new("m"),
            json!({".start": {"text": "modes.draw.start", "title": "modes.draw.hint"}, "#gone": "x"}),
        )
        .unwrap();
        assert_eq!(map.apply(&mut doc, lookup), 2);

        for node in [first, second] {
            assert_eq!(doc.direct_text(node), "Los");
            assert_eq!(doc.element(node).attr("title"), Some("Startet"));
        }
    }

    #[test]
    fn test_later_rule_wins_on_overlap() {
        let mut doc = Document::new();
        let body = doc.body();
        let start = doc.append_element(body, "button", &[("id", "start")]);
        let other = doc.append_element(body, "button", &[]);

        let map = DomMap::from_value(
            Path::new("m"),
            json!({"button": "generic", "#start": "specific"}),
        )
        .unwrap();
        map.apply(&mut doc, lookup);

        assert_eq!(doc.direct_text(start), "specific");
        assert_eq!(doc.direct_text(other), "generic");
    }

    #[test]
    fn test_extend_replaces_in_place() {
        let mut map = DomMap::from_value(Path::new("a"), json!({"#start": "one", "button": "two"})).unwrap();
        let later = DomMap::from_value(Path::new("b"), json!({"#start": "three", "#title": "four"})).unwrap();
        map.extend(later);

        let selectors: Vec<&str> = map.rules.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(selectors, vec!["#start", "button", "#title"]);
        assert_eq!(map.rule("#start"), Some(&MapRule::Text("three".to_string())));
    }
}
