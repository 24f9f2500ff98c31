//! # RoboPaint I18n
//!
//! Builds the per-language resource tree from shared and mode-local
//! resource files and applies it to a mode's document, either through an
//! explicit selector map or through in-document translation markers.

pub mod dom_map;
pub mod native;
pub mod resources;
pub mod translator;

pub use dom_map::{DomMap, MapRule};
pub use resources::{ResourceSources, ResourceTree};
pub use translator::{TranslatePass, TranslationStrategy, Translator};
