//! # RoboPaint Core
//!
//! Core types and error definitions for the RoboPaint mode bridge.
//! Every other crate in the workspace reports failures through
//! [`BridgeError`] and identifies modes with [`ModeId`].

pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use id::*;
pub use result::*;
