//! Key lookup and document translation.

use crate::{native, DomMap, ResourceTree};
use robopaint_core::ModeId;
use robopaint_dom::Document;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// How a mode's document is translated, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationStrategy {
    /// Explicit selector map.
    DomMap(DomMap),
    /// In-document `data-i18n` markers.
    Native,
}

/// Result of a translation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatePass {
    /// The document was not ready; nothing was touched.
    Deferred,
    /// The pass ran and updated this many elements.
    Applied(usize),
}

/// Resolves translation keys for one mode and applies them to its document.
///
/// Switching language only changes which subtree of the (immutable)
/// resource tree is read.
#[derive(Debug, Clone)]
pub struct Translator {
    mode: ModeId,
    resources: Arc<ResourceTree>,
    strategy: TranslationStrategy,
    language: String,
    fallback: Option<String>,
}

impl Translator {
    /// Creates a translator.
    pub fn new(
        mode: ModeId,
        resources: Arc<ResourceTree>,
        strategy: TranslationStrategy,
        language: impl Into<String>,
        fallback: Option<String>,
    ) -> Self {
        Self {
            mode,
            resources,
            strategy,
            language: language.into(),
            fallback,
        }
    }

    /// Returns the active language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Switches the active language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
        debug!(mode = %self.mode, language = %self.language, "Language switched");
    }

    /// Returns the strategy.
    #[must_use]
    pub const fn strategy(&self) -> &TranslationStrategy {
        &self.strategy
    }

    /// Looks a key up without interpolation.
    ///
    /// Tries `modes.<mode>.<key>` and then `key` itself in the active
    /// language, then the same in the fallback language.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let scoped = format!("{}.{}", self.mode.resource_prefix(), key);
        std::iter::once(self.language.as_str())
            .chain(self.fallback.as_deref())
            .find_map(|language| {
                self.resources
                    .get(language, &scoped)
                    .or_else(|| self.resources.get(language, key))
            })
    }

    /// Translates a key, returning the key itself when nothing resolves.
    ///
    /// `{{name}}` and `__name__` placeholders are replaced from `vars`.
    #[must_use]
    pub fn t(&self, key: &str, vars: &Map<String, Value>) -> String {
        let template = self.lookup(key).unwrap_or(key);
        interpolate(template, vars)
    }

    /// Translates the document with the session's strategy.
    ///
    /// Never runs on a document that is not ready.
    pub fn translate(&self, doc: &mut Document) -> TranslatePass {
        if !doc.is_ready() {
            debug!(mode = %self.mode, "Document not ready, translation deferred");
            return TranslatePass::Deferred;
        }

        let lookup = |key: &str| self.t(key, &Map::new());
        let updated = match &self.strategy {
            TranslationStrategy::DomMap(map) => map.apply(doc, lookup),
            TranslationStrategy::Native => {
                native::normalize_markers(doc);
                native::apply_markers(doc, lookup)
            }
        };
        debug!(mode = %self.mode, language = %self.language, updated, "Document translated");
        TranslatePass::Applied(updated)
    }
}

/// Substitutes `{{name}}` and `__name__` placeholders in one pass over the
/// template. Substituted text is never scanned again.
fn interpolate(template: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(ch) = rest.chars().next() {
        if let Some((name, len)) = placeholder(rest) {
            if let Some(value) = vars.get(name) {
                match value {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                rest = &rest[len..];
                continue;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Returns the variable name and byte length of a placeholder at the start
/// of `text`.
fn placeholder(text: &str) -> Option<(&str, usize)> {
    let (body, close) = if let Some(body) = text.strip_prefix("{{") {
        (body, "}}")
    } else {
        (text.strip_prefix("__")?, "__")
    };
    let end = body.find(close)?;
    Some((&body[..end], end + 4))
}
