//! In-document translation markers.
//!
//! Elements opt in with a `data-i18n` attribute. An empty marker means "use
//! my own text as the key" and is rewritten to that text on first sight, so
//! later passes look up the original key rather than a translated string.
//! A marker holds one or more `;` separated targets; `[attr]key` targets an
//! attribute, a bare key (or `[text]key`) the direct text.

use robopaint_dom::{Document, NodeId};
use tracing::debug;

/// Attribute carrying the translation marker.
pub const MARKER_ATTR: &str = "data-i18n";

/// Where a marker target writes its translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerTarget {
    Text,
    Attribute(String),
}

/// Splits a marker value into its targets.
#[must_use]
pub fn parse_marker(marker: &str) -> Vec<(MarkerTarget, String)> {
    marker
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let Some(rest) = part.strip_prefix('[') else {
                return Some((MarkerTarget::Text, part.to_string()));
            };
            let (attr, key) = rest.split_once(']')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let target = match attr.trim() {
                "" | "text" | "html" => MarkerTarget::Text,
                attr => MarkerTarget::Attribute(attr.to_string()),
            };
            Some((target, key.to_string()))
        })
        .collect()
}

/// Rewrites every empty marker to its element's own direct text.
///
/// Returns the normalized elements.
pub fn normalize_markers(doc: &mut Document) -> Vec<NodeId> {
    let empty: Vec<NodeId> = doc
        .elements_with_attr(MARKER_ATTR)
        .into_iter()
        .filter(|node| doc.element(*node).attr(MARKER_ATTR).is_some_and(|m| m.trim().is_empty()))
        .collect();

    for node in &empty {
        let key = doc.direct_text(*node);
        debug!(key = %key, "Normalized empty translation marker");
        doc.set_attr(*node, MARKER_ATTR, key);
    }
    empty
}

/// Translates every marked element, resolving keys with `lookup`.
///
/// Returns the number of elements updated.
pub fn apply_markers(doc: &mut Document, lookup: impl Fn(&str) -> String) -> usize {
    let marked = doc.elements_with_attr(MARKER_ATTR);
    let mut updated = 0;
    for node in marked {
        let marker = doc.element(node).attr(MARKER_ATTR).unwrap_or_default().to_string();
        let targets = parse_marker(&marker);
        if targets.is_empty() {
            continue;
        }
        for (target, key) in targets {
            let text = lookup(&key);
            match target {
                MarkerTarget::Text => doc.set_direct_text(node, &text),
                MarkerTarget::Attribute(attr) => doc.set_attr(node, &attr, text),
            }
        }
        updated += 1;
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn german(key: &str) -> String {
        match key {
            "Start" => "Los".to_string(),
            "modes.draw.hint" => "Startet".to_string(),
            "common.hello" => "Hallo".to_string(),
            other => other.to_string(),
        }
    }

    #[test]
    fn test_parse_marker_targets() {
        assert_eq!(parse_marker("common.hello"), vec![(MarkerTarget::Text, "common.hello".to_string())]);
        assert_eq!(
            parse_marker("[title]modes.draw.hint; [text]Start"),
            vec![
                (MarkerTarget::Attribute("title".to_string()), "modes.draw.hint".to_string()),
                (MarkerTarget::Text, "Start".to_string()),
            ]
        );
        assert!(parse_marker("[title]").is_empty());
        assert!(parse_marker("[title").is_empty());
        assert!(parse_marker("  ").is_empty());
    }

    #[test]
    fn test_normalization_is_one_time() {
        let mut doc = Document::new();
        let body = doc.body();
        let button = doc.append_element(body, "button", &[("data-i18n", "")]);
        doc.append_text(button, "Start");

        assert_eq!(normalize_markers(&mut doc), vec![button]);
        apply_markers(&mut doc, german);
        assert_eq!(doc.direct_text(button), "Los");

        assert!(normalize_markers(&mut doc).is_empty());
        assert_eq!(doc.element(button).attr(MARKER_ATTR), Some("Start"));
        apply_markers(&mut doc, german);
        assert_eq!(doc.direct_text(button), "Los");
    }

    #[test]
    fn test_apply_attribute_and_text() {
        let mut doc = Document::new();
        let body = doc.body();
        let greeting = doc.append_element(body, "p", &[("data-i18n", "common.hello")]);
        let link = doc.append_element(body, "a", &[("data-i18n", "[title]modes.draw.hint")]);
        doc.append_text(link, "keep me");
        doc.append_element(body, "div", &[]);

        assert_eq!(apply_markers(&mut doc, german), 2);
        assert_eq!(doc.direct_text(greeting), "Hallo");
        assert_eq!(doc.element(link).attr("title"), Some("Startet"));
        assert_eq!(doc.direct_text(link), "keep me");
    }
}
