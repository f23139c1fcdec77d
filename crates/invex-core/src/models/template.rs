//! Template and field definitions, in their serialized JSON form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::OptionError;

/// A named rule set: identifiers that recognize a document plus the fields
/// to extract from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique template name.
    pub template_name: String,

    /// Literal substrings that must all occur in the document text.
    #[serde(default)]
    pub identifiers: Vec<String>,

    /// Fields in extraction order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl Template {
    pub fn new(template_name: impl Into<String>) -> Self {
        Self {
            template_name: template_name.into(),
            identifiers: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// True when every identifier occurs in `text`.
    ///
    /// A template without identifiers never matches.
    pub fn matches(&self, text: &str) -> bool {
        !self.identifiers.is_empty() && self.identifiers.iter().all(|id| text.contains(id.as_str()))
    }

    /// Look up a field by name.
    pub fn field(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }
}

/// How to extract one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Key of the value in the result mapping.
    pub field_name: String,

    /// Label alternatives; the first one found wins.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Registered strategy name, e.g. `SAME_LINE`.
    pub strategy: String,

    /// Strategy-specific options.
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldDefinition {
    pub fn new(field_name: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            keywords: Vec::new(),
            strategy: strategy.into(),
            options: FieldOptions::default(),
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }
}

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    /// Any other JSON shape. Kept so unknown keys do not break loading.
    Other(serde_json::Value),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "boolean",
            OptionValue::Number(_) => "number",
            OptionValue::Text(_) => "string",
            OptionValue::List(_) => "list of strings",
            OptionValue::Other(serde_json::Value::Null) => "null",
            OptionValue::Other(_) => "unsupported value",
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, OptionValue::Other(serde_json::Value::Null))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        OptionValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Option map of a field with typed, strict accessors.
///
/// Every accessor returns `Ok(None)` when the key is absent or null and an
/// [`OptionError`] when the value has the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldOptions(BTreeMap<String, OptionValue>);

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn string(&self, key: &str) -> Result<Option<&str>, OptionError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(wrong_type(key, "string", other)),
        }
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>, OptionError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Number(n)) if n.is_finite() => Ok(Some(*n)),
            Some(OptionValue::Number(_)) => Err(OptionError::new(key, "number must be finite")),
            Some(other) => Err(wrong_type(key, "number", other)),
        }
    }

    /// A number with no fractional part.
    pub fn integer(&self, key: &str) -> Result<Option<i64>, OptionError> {
        match self.number(key)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
            Some(n) => Err(OptionError::new(key, format!("expected an integer, got {n}"))),
        }
    }

    /// A non-negative integer usable as an index or count.
    pub fn index(&self, key: &str) -> Result<Option<usize>, OptionError> {
        match self.integer(key)? {
            None => Ok(None),
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            Some(n) => Err(OptionError::new(key, format!("must be >= 0, got {n}"))),
        }
    }

    pub fn boolean(&self, key: &str) -> Result<Option<bool>, OptionError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(key, "boolean", other)),
        }
    }

    pub fn string_list(&self, key: &str) -> Result<Option<&[String]>, OptionError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::List(items)) => Ok(Some(items.as_slice())),
            Some(other) => Err(wrong_type(key, "list of strings", other)),
        }
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for FieldOptions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn wrong_type(key: &str, expected: &str, found: &OptionValue) -> OptionError {
    OptionError::new(key, format!("expected {expected}, got {}", found.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEMPLATE_JSON: &str = r#"{
        "templateName": "non-tax-receipt",
        "identifiers": ["非税收入", "票据代码"],
        "detailFields": {"tableIdentifiers": []},
        "fields": [
            {
                "fieldName": "payer",
                "keywords": ["交款人"],
                "strategy": "SAME_LINE",
                "options": {"trimChars": ":", "yTolerance": 0.5}
            },
            {
                "fieldName": "items",
                "keywords": [],
                "strategy": "TABLE",
                "options": {"headerKeyword": "项目名称", "stopAtKeywords": ["合计"], "extra": {"nested": 1}}
            }
        ]
    }"#;

    #[test]
    fn test_template_deserializes_stored_form() {
        let template: Template = serde_json::from_str(TEMPLATE_JSON).unwrap();
        assert_eq!(template.template_name, "non-tax-receipt");
        assert_eq!(template.identifiers, vec!["非税收入", "票据代码"]);
        assert_eq!(template.fields.len(), 2);

        let payer = template.field("payer").unwrap();
        assert_eq!(payer.options.string("trimChars").unwrap(), Some(":"));
        assert_eq!(payer.options.number("yTolerance").unwrap(), Some(0.5));

        let items = template.field("items").unwrap();
        assert_eq!(
            items.options.string_list("stopAtKeywords").unwrap(),
            Some(&["合计".to_string()][..])
        );
        assert!(items.options.contains("extra"));
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let template: Template = serde_json::from_str(r#"{"templateName": "bare"}"#).unwrap();
        assert!(template.identifiers.is_empty());
        assert!(template.fields.is_empty());
        assert!(!template.matches("anything"));
    }

    #[test]
    fn test_matches_requires_all_identifiers() {
        let template = Template::new("t").with_identifier("A").with_identifier("B");
        assert!(template.matches("xx A yy B"));
        assert!(!template.matches("xx A yy"));
    }

    #[test]
    fn test_typed_accessors_are_strict() {
        let options: FieldOptions = [
            ("columnIndex", OptionValue::from(1.5)),
            ("rowIndex", OptionValue::from(-1)),
            ("pattern", OptionValue::from(3)),
            ("flag", OptionValue::from(true)),
        ]
        .into_iter()
        .collect();

        assert!(options.index("columnIndex").is_err());
        assert!(options.index("rowIndex").is_err());
        assert_eq!(options.string("pattern").unwrap_err().key, "pattern");
        assert_eq!(options.boolean("flag").unwrap(), Some(true));
        assert_eq!(options.number("absent").unwrap(), None);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let options: FieldOptions = serde_json::from_str(r#"{"maxDistance": null}"#).unwrap();
        assert!(!options.contains("maxDistance"));
        assert_eq!(options.number("maxDistance").unwrap(), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let template = Template::new("t")
            .with_identifier("ID")
            .with_field(FieldDefinition::new("f", "REGEX").with_option("pattern", "\\d+"));
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["templateName"], "t");
        assert_eq!(json["fields"][0]["fieldName"], "f");
        assert_eq!(json["fields"][0]["options"]["pattern"], "\\d+");
    }
}
