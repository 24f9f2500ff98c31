//! # RoboPaint Config
//!
//! Configuration management for the RoboPaint mode bridge.
//! Supports layered configuration from files and environment variables,
//! with runtime reload.

mod bridge_config;
mod loader;

pub use bridge_config::*;
pub use loader::*;
