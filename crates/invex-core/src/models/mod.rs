//! Data models: glyphs, templates, results and configuration.

pub mod config;
pub mod glyph;
pub mod result;
pub mod template;

pub use glyph::{Glyph, Page};
pub use result::ExtractionResult;
pub use template::{FieldDefinition, FieldOptions, OptionValue, Template};
