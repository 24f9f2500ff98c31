//! # RoboPaint Settings
//!
//! Per-mode settings persistence and the form binding layer that keeps
//! page controls and the persisted document in sync.

pub mod backend;
pub mod binding;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, SettingsBackend};
pub use binding::{manage, BindingEntry};
pub use store::{SettingsStore, SharedSettings};
