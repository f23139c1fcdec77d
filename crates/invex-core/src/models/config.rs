//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::layout::LineReconstructor;

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Template store configuration.
    pub templates: TemplateConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// PDF decoding configuration.
    pub pdf: PdfConfig,

    /// Line reconstruction tuning.
    pub layout: LayoutConfig,
}

/// Template store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding one JSON file per template.
    pub path: PathBuf,

    /// Refuse save/delete through the store.
    pub read_only: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("templates"),
            read_only: false,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run the fields of a template in parallel (needs the `parallel` feature).
    pub parallel_fields: bool,

    /// Hand strategies the glyphs in reconstructed reading order instead of
    /// decoder order.
    pub reading_order_glyphs: bool,

    /// Reject file names that do not end in `.pdf`.
    pub require_pdf_extension: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parallel_fields: false,
            reading_order_glyphs: true,
            require_pdf_extension: true,
        }
    }
}

/// PDF decoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Retry encrypted documents with the empty user password.
    pub try_empty_password: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            try_empty_password: true,
        }
    }
}

/// Line reconstruction constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Share of the line height accepted as baseline jitter.
    pub line_tolerance_factor: f32,
    /// Lower clamp of the line tolerance.
    pub min_line_tolerance: f32,
    /// Upper clamp of the line tolerance.
    pub max_line_tolerance: f32,
    /// Share of the space width that counts as a word gap.
    pub space_gap_factor: f32,
    /// Smallest gap that ever counts as a word gap.
    pub min_space_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_tolerance_factor: 0.6,
            min_line_tolerance: 1.5,
            max_line_tolerance: 6.0,
            space_gap_factor: 0.35,
            min_space_gap: 1.0,
        }
    }
}

impl LayoutConfig {
    /// Build a reconstructor with these constants.
    pub fn reconstructor(&self) -> LineReconstructor {
        LineReconstructor::new()
            .with_tolerance_factor(self.line_tolerance_factor)
            .with_tolerance_bounds(self.min_line_tolerance, self.max_line_tolerance)
            .with_space_gap(self.space_gap_factor, self.min_space_gap)
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"extraction": {"parallel_fields": true}}"#).unwrap();
        assert!(config.extraction.parallel_fields);
        assert!(config.extraction.reading_order_glyphs);
        assert_eq!(config.templates.path, PathBuf::from("templates"));
        assert_eq!(config.layout.max_line_tolerance, 6.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.templates.read_only = true;
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert!(loaded.templates.read_only);
    }
}
