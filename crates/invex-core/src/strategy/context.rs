//! Per-field input handed to a strategy.

use crate::models::{FieldDefinition, FieldOptions, Glyph};

/// Everything a strategy may look at while extracting one field.
///
/// Built once per field and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub field: &'a FieldDefinition,
    /// Reconstructed page text.
    pub full_text: &'a str,
    /// Glyphs of the page.
    pub glyphs: &'a [Glyph],
    pub page_width: f32,
    pub page_height: f32,
    /// Every field of the enclosing template, this one included.
    pub template_fields: &'a [FieldDefinition],
}

impl<'a> ExtractionContext<'a> {
    pub fn new(
        field: &'a FieldDefinition,
        template_fields: &'a [FieldDefinition],
        full_text: &'a str,
        glyphs: &'a [Glyph],
        page_width: f32,
        page_height: f32,
    ) -> Self {
        Self {
            field,
            full_text,
            glyphs,
            page_width,
            page_height,
            template_fields,
        }
    }

    pub fn field_name(&self) -> &'a str {
        &self.field.field_name
    }

    pub fn keywords(&self) -> &'a [String] {
        &self.field.keywords
    }

    pub fn options(&self) -> &'a FieldOptions {
        &self.field.options
    }

    /// Keywords of the other fields that may bound this field's value.
    ///
    /// Keywords this field lists itself are excluded; order follows the
    /// template and duplicates are dropped.
    pub fn stop_keywords(&self) -> Vec<&'a str> {
        let own = &self.field.keywords;
        let mut stops: Vec<&'a str> = Vec::new();
        for kw in self.template_fields.iter().flat_map(|f| f.keywords.iter()) {
            if kw.is_empty() || own.contains(kw) || stops.contains(&kw.as_str()) {
                continue;
            }
            stops.push(kw.as_str());
        }
        stops
    }
}
