//! Field extraction strategies and their registry.
//!
//! A strategy turns an [`ExtractionContext`] into at most one value. Each
//! one parses the field's option map into its own typed options struct;
//! validation is that parse succeeding, so broken templates are caught when
//! they are loaded rather than when a document arrives.

mod area;
mod below;
mod context;
pub mod glyphs;
pub mod pattern;
mod regex;
mod same_line;
mod table;

pub use area::{AreaOptions, AreaStrategy, SortOrder};
pub use below::{BelowOptions, BelowStrategy, XAlignment};
pub use context::ExtractionContext;
pub use self::regex::{RegexOptions, RegexStrategy, SearchScope};
pub use same_line::{SameLineOptions, SameLineStrategy};
pub use table::{column_boundaries, group_rows, TableOptions, TableStrategy};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{InvexError, OptionError, StrategyError};
use crate::models::{FieldDefinition, FieldOptions, Template};

pub const SAME_LINE: &str = "SAME_LINE";
pub const BELOW: &str = "BELOW";
pub const AREA: &str = "AREA";
pub const TABLE: &str = "TABLE";
pub const REGEX: &str = "REGEX";

/// An algorithm computing one field value from a context.
///
/// Implementations are stateless and shared across threads. A strategy
/// parses a field's options once, in [`prepare`](Self::prepare), into the
/// [`FieldExtractor`] that runs for every document.
pub trait ExtractionStrategy: Send + Sync {
    /// Name templates refer to this strategy by.
    fn name(&self) -> &str;

    /// Parse a field's options into a ready extractor.
    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError>;

    /// Check a field's options before any extraction runs.
    fn validate_options(&self, options: &FieldOptions) -> Result<(), OptionError> {
        self.prepare(options).map(|_| ())
    }

    /// Prepare and run in one step, for callers that do not keep the
    /// prepared extractor.
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        self.prepare(ctx.options())?.extract(ctx)
    }
}

/// A field's parsed options, bound to the strategy that reads them.
pub trait FieldExtractor: Send + Sync {
    /// Extract the field. `Ok(None)` means nothing was found, which is not
    /// an error.
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError>;
}

/// Strategy name to implementation.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ExtractionStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// A registry holding the five built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SameLineStrategy));
        registry.register(Arc::new(BelowStrategy));
        registry.register(Arc::new(AreaStrategy));
        registry.register(Arc::new(TableStrategy));
        registry.register(Arc::new(RegexStrategy));
        registry
    }

    /// Register a strategy under its name, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        let name = strategy.name().to_string();
        if self.strategies.insert(name.clone(), strategy).is_some() {
            warn!("Strategy {} registered twice, the later registration wins", name);
        } else {
            debug!("Registered strategy {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExtractionStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up the strategy of `field` and prepare its options.
    pub fn resolve(&self, field: &FieldDefinition) -> Result<Arc<dyn FieldExtractor>, InvexError> {
        let strategy = self
            .get(&field.strategy)
            .ok_or_else(|| InvexError::StrategyNotFound {
                field: field.field_name.clone(),
                strategy: field.strategy.clone(),
            })?;

        strategy
            .prepare(&field.options)
            .map_err(|source| InvexError::InvalidTemplateOptions {
                field: field.field_name.clone(),
                strategy: field.strategy.clone(),
                source,
            })
    }

    /// Every configuration problem of `template`, in field order.
    pub fn validate_template(&self, template: &Template) -> Vec<InvexError> {
        template
            .fields
            .iter()
            .filter_map(|field| self.resolve(field).err())
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

/// A number option that must not be negative.
pub(crate) fn non_negative(options: &FieldOptions, key: &str) -> Result<Option<f32>, OptionError> {
    match options.number(key)? {
        Some(n) if n < 0.0 => Err(OptionError::new(key, format!("must be >= 0, got {n}"))),
        other => Ok(other.map(|n| n as f32)),
    }
}

/// A number option that must be strictly positive.
pub(crate) fn positive(options: &FieldOptions, key: &str) -> Result<Option<f32>, OptionError> {
    match options.number(key)? {
        Some(n) if n <= 0.0 => Err(OptionError::new(key, format!("must be > 0, got {n}"))),
        other => Ok(other.map(|n| n as f32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Copy)]
    struct Fixed(&'static str);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &str {
            SAME_LINE
        }

        fn prepare(&self, _options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
            Ok(Arc::new(*self))
        }
    }

    impl FieldExtractor for Fixed {
        fn extract(&self, _ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[test]
    fn test_defaults_are_registered() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.names(), vec![AREA, BELOW, REGEX, SAME_LINE, TABLE]);
        assert!(registry.contains(TABLE));
        assert!(registry.get("NEAREST").is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = StrategyRegistry::with_defaults();
        registry.register(Arc::new(Fixed("stub")));

        let field = FieldDefinition::new("f", SAME_LINE);
        let fields = vec![field.clone()];
        let ctx = ExtractionContext::new(&field, &fields, "", &[], 0.0, 0.0);
        let value = registry.get(SAME_LINE).unwrap().extract(&ctx).unwrap();
        assert_eq!(value.as_deref(), Some("stub"));
        assert_eq!(registry.names().len(), 5);
    }

    #[test]
    fn test_resolve_reports_unknown_strategy() {
        let registry = StrategyRegistry::with_defaults();
        let err = registry
            .resolve(&FieldDefinition::new("total", "NEAREST"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "StrategyNotFound");
    }

    #[test]
    fn test_validate_template_collects_every_failure() {
        let registry = StrategyRegistry::with_defaults();
        let template = Template::new("t")
            .with_identifier("X")
            .with_field(FieldDefinition::new("ok", REGEX).with_option("pattern", r"\d+"))
            .with_field(FieldDefinition::new("no_pattern", REGEX))
            .with_field(FieldDefinition::new("area", AREA).with_option("x_start", 1))
            .with_field(FieldDefinition::new("unknown", "NEAREST"));

        let errors = registry.validate_template(&template);
        let kinds: Vec<_> = errors.iter().map(InvexError::kind).collect();
        assert_eq!(
            kinds,
            vec!["InvalidTemplateOptions", "InvalidTemplateOptions", "StrategyNotFound"]
        );
    }
}
