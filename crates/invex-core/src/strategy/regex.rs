//! Value matched by a regular expression over the page text.

use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use super::{pattern, ExtractionContext, ExtractionStrategy, FieldExtractor, REGEX};
use crate::error::{OptionError, StrategyError};
use crate::models::FieldOptions;

/// Which part of the page text the pattern runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    Full,
    /// Text after the first keyword found, or the full text if none is.
    AfterKeyword,
}

impl FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FULL" => Ok(SearchScope::Full),
            "AFTER_KEYWORD" => Ok(SearchScope::AfterKeyword),
            other => Err(format!("expected FULL or AFTER_KEYWORD, got {other}")),
        }
    }
}

/// Options of [`RegexStrategy`].
#[derive(Debug, Clone)]
pub struct RegexOptions {
    pub pattern: Regex,
    /// Capture group to return; 0 is the whole match.
    pub group_index: usize,
    pub search_scope: SearchScope,
}

impl RegexOptions {
    pub fn parse(options: &FieldOptions) -> Result<Self, OptionError> {
        let source = options
            .string("pattern")?
            .ok_or_else(|| OptionError::missing("pattern"))?;

        Ok(Self {
            pattern: pattern::compile("pattern", source)?,
            group_index: options.index("groupIndex")?.unwrap_or(0),
            search_scope: options
                .string("searchScope")?
                .map(|s| {
                    s.parse::<SearchScope>()
                        .map_err(|reason| OptionError::new("searchScope", reason))
                })
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

/// Runs a pattern over the reconstructed page text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexStrategy;

impl ExtractionStrategy for RegexStrategy {
    fn name(&self) -> &str {
        REGEX
    }

    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
        Ok(Arc::new(RegexOptions::parse(options)?))
    }
}

impl FieldExtractor for RegexOptions {
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        let haystack = match self.search_scope {
            SearchScope::Full => ctx.full_text,
            SearchScope::AfterKeyword => after_first_keyword(ctx.full_text, ctx.keywords()),
        };

        let Some(caps) = self.pattern.captures(haystack) else {
            warn!(
                "Field {}: pattern {} did not match",
                ctx.field_name(),
                self.pattern.as_str()
            );
            return Ok(None);
        };

        let matched = if self.group_index > 0 && self.group_index < caps.len() {
            caps.get(self.group_index)
        } else {
            caps.get(0)
        };

        match matched.map(|m| m.as_str().trim()) {
            Some(value) if !value.is_empty() => {
                info!("Field {} REGEX value: {}", ctx.field_name(), value);
                Ok(Some(value.to_string()))
            }
            _ => Ok(None),
        }
    }
}

fn after_first_keyword<'t>(text: &'t str, keywords: &[String]) -> &'t str {
    for keyword in keywords.iter().filter(|k| !k.is_empty()) {
        if let Some(index) = text.find(keyword.as_str()) {
            debug!("Searching after keyword '{}'", keyword);
            return &text[index + keyword.len()..];
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDefinition;
    use pretty_assertions::assert_eq;

    fn extract(field: FieldDefinition, text: &str) -> Option<String> {
        let fields = vec![field];
        let ctx = ExtractionContext::new(&fields[0], &fields, text, &[], 600.0, 800.0);
        RegexStrategy.extract(&ctx).unwrap()
    }

    fn amount() -> FieldDefinition {
        FieldDefinition::new("total", REGEX).with_option("pattern", r"([0-9]+\.[0-9]{2})")
    }

    #[test]
    fn test_capture_group() {
        let field = amount().with_option("groupIndex", 1);
        assert_eq!(extract(field, "合计: 128.50元").as_deref(), Some("128.50"));
    }

    #[test]
    fn test_group_beyond_count_returns_whole_match() {
        let field = FieldDefinition::new("total", REGEX)
            .with_option("pattern", r"合计:\s*([0-9.]+)")
            .with_option("groupIndex", 4);
        assert_eq!(extract(field, "合计: 128.50元").as_deref(), Some("合计: 128.50"));
    }

    #[test]
    fn test_unmatched_optional_group_is_empty() {
        let field = FieldDefinition::new("code", REGEX)
            .with_option("pattern", r"No\.(X)?\d+")
            .with_option("groupIndex", 1);
        assert_eq!(extract(field, "No.42"), None);
    }

    #[test]
    fn test_after_keyword_scope() {
        let text = "小计 10.00\n合计 128.50";
        let field = amount()
            .with_keyword("合计")
            .with_option("searchScope", "after_keyword");
        assert_eq!(extract(field.clone(), text).as_deref(), Some("128.50"));

        // Without the keyword the whole text is searched.
        assert_eq!(extract(field, "小计 10.00").as_deref(), Some("10.00"));
        assert_eq!(extract(amount(), text).as_deref(), Some("10.00"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract(amount(), "no amounts here"), None);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            RegexStrategy.validate_options(&FieldOptions::new()).unwrap_err().key,
            "pattern"
        );
        let bad = FieldDefinition::new("x", REGEX).with_option("pattern", "([0-9");
        assert!(RegexStrategy.validate_options(&bad.options).is_err());

        let negative = amount().with_option("groupIndex", -1);
        assert_eq!(
            RegexStrategy.validate_options(&negative.options).unwrap_err().key,
            "groupIndex"
        );

        let scope = amount().with_option("searchScope", "BEFORE_KEYWORD");
        assert_eq!(
            RegexStrategy.validate_options(&scope.options).unwrap_err().key,
            "searchScope"
        );
    }
}
