//! Extraction output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Values extracted from one document.
///
/// Only fields that produced a non-empty value are present in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Name of the processed file.
    pub file_name: String,
    /// Name of the template that matched.
    pub template_name: String,
    /// Field name to extracted value.
    pub fields: BTreeMap<String, String>,
}

impl ExtractionResult {
    pub fn new(file_name: impl Into<String>, template_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            template_name: template_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.fields.get(field_name).map(String::as_str)
    }
}
