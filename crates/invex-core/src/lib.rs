//! Core library for template-driven field extraction from PDF documents.
//!
//! This crate provides:
//! - PDF decoding into positioned glyphs (first page only)
//! - Line reconstruction from glyph coordinates
//! - Template stores (in-memory and one JSON file per template)
//! - Pluggable extraction strategies (`SAME_LINE`, `BELOW`, `AREA`, `TABLE`, `REGEX`)
//! - A [`DocumentProcessor`] tying the pieces together

pub mod error;
pub mod layout;
pub mod models;
pub mod pdf;
pub mod processor;
pub mod strategy;
pub mod template;

pub use error::{InvexError, OptionError, PdfError, Result, StrategyError, TemplateError};
pub use layout::{Line, LineReconstructor};
pub use models::config::InvexConfig;
pub use models::{ExtractionResult, FieldDefinition, FieldOptions, Glyph, OptionValue, Page, Template};
pub use pdf::GlyphDecoder;
#[cfg(feature = "native")]
pub use pdf::PdfGlyphDecoder;
pub use processor::DocumentProcessor;
pub use strategy::{ExtractionContext, ExtractionStrategy, FieldExtractor, StrategyRegistry};
pub use template::{FileSystemTemplateStore, MemoryTemplateStore, TemplateSet, TemplateStore};
