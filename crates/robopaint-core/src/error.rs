//! Unified error type for the mode bridge.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for every layer of the mode bridge.
///
/// Only boot-time and configuration failures are expected to reach a
/// caller. Per-item problems (a malformed resource file, an unmatched
/// selector, an incompatible form control) are logged where they happen
/// and never turned into one of these.
#[derive(Error, Debug)]
pub enum BridgeError {
    // ============ Boot Errors ============
    /// The mode package descriptor could not be resolved
    #[error("Mode descriptor error: {path} - {message}")]
    Descriptor { path: String, message: String },

    /// The mode base path does not exist or is not a directory
    #[error("Mode base path not found: {0}")]
    BasePath(String),

    /// A boot prerequisite failed to resolve
    #[error("Boot prerequisite failed: {name} - {message}")]
    Prerequisite { name: &'static str, message: String },

    // ============ Settings Errors ============
    /// The settings backing store rejected an operation
    #[error("Settings storage error: {0}")]
    Storage(String),

    // ============ I18n Errors ============
    /// A resource file could not be read or parsed
    #[error("Resource error: {path} - {message}")]
    Resource { path: String, message: String },

    /// A selector could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    // ============ IPC Errors ============
    /// An inbound IPC message had an unexpected shape
    #[error("Malformed IPC message on '{channel}': {message}")]
    MalformedMessage { channel: String, message: String },

    /// The host side of the IPC channel is gone
    #[error("IPC channel closed: {0}")]
    ChannelClosed(String),

    // ============ Configuration Errors ============
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Descriptor { .. } => "DESCRIPTOR_ERROR",
            Self::BasePath(_) => "BASE_PATH_NOT_FOUND",
            Self::Prerequisite { .. } => "PREREQUISITE_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Resource { .. } => "RESOURCE_ERROR",
            Self::Selector { .. } => "INVALID_SELECTOR",
            Self::MalformedMessage { .. } => "MALFORMED_MESSAGE",
            Self::ChannelClosed(_) => "CHANNEL_CLOSED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a descriptor error.
    #[must_use]
    pub fn descriptor<P: ToString, M: Into<String>>(path: P, message: M) -> Self {
        Self::Descriptor {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates a resource error.
    #[must_use]
    pub fn resource<P: ToString, M: Into<String>>(path: P, message: M) -> Self {
        Self::Resource {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage<T: Into<String>>(message: T) -> Self {
        Self::Storage(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks whether this error must abort loading the mode.
    ///
    /// There is no degraded mode for these: a mode that cannot find its
    /// own package or base path, or whose prerequisites fail, never boots.
    #[must_use]
    pub const fn is_fatal_at_boot(&self) -> bool {
        matches!(
            self,
            Self::Descriptor { .. } | Self::BasePath(_) | Self::Prerequisite { .. } | Self::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BridgeError::descriptor("package.json", "missing").error_code(), "DESCRIPTOR_ERROR");
        assert_eq!(BridgeError::BasePath("/nope".to_string()).error_code(), "BASE_PATH_NOT_FOUND");
        assert_eq!(BridgeError::storage("disk full").error_code(), "STORAGE_ERROR");
        assert_eq!(BridgeError::resource("en.json", "bad json").error_code(), "RESOURCE_ERROR");
        assert_eq!(BridgeError::ChannelClosed("host".to_string()).error_code(), "CHANNEL_CLOSED");
        assert_eq!(BridgeError::internal("oops").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_fatal_at_boot() {
        assert!(BridgeError::descriptor("package.json", "missing").is_fatal_at_boot());
        assert!(BridgeError::BasePath("/nope".to_string()).is_fatal_at_boot());
        assert!(BridgeError::Configuration("no mode dir".to_string()).is_fatal_at_boot());
        assert!(!BridgeError::resource("en.json", "bad json").is_fatal_at_boot());
        assert!(!BridgeError::storage("locked").is_fatal_at_boot());
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::resource("_i18n/de.json", "expected value");
        let text = err.to_string();
        assert!(text.contains("_i18n/de.json"));
        assert!(text.contains("expected value"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BridgeError = json_err.into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
