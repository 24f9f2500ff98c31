//! Result type aliases for the mode bridge.

use crate::BridgeError;

/// A specialized `Result` type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
