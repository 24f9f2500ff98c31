//! # RoboPaint DOM
//!
//! A small in-memory document model for mode pages: an element arena with
//! text nodes, simple CSS selectors, form-control values and change
//! listeners. Settings binding and translation operate on this model
//! instead of a browser DOM.

mod document;
pub mod selector;

pub use document::*;
pub use selector::SelectorList;
