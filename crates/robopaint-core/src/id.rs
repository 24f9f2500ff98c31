//! Typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A strongly-typed wrapper for mode names.
///
/// The mode name namespaces both the persisted settings document and the
/// `modes.<name>` subtree of the translation resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeId(pub String);

impl ModeId {
    /// Creates a new mode ID.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the mode name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key the mode's settings document is stored under.
    #[must_use]
    pub fn settings_key(&self) -> String {
        format!("{}-settings", self.0)
    }

    /// Returns the dotted prefix of the mode's translation subtree.
    #[must_use]
    pub fn resource_prefix(&self) -> String {
        format!("modes.{}", self.0)
    }
}

impl Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
