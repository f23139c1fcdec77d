//! Value inside a fixed rectangle of the page.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::glyphs::{by_x, by_y, by_y_then_x};
use super::{non_negative, ExtractionContext, ExtractionStrategy, FieldExtractor, AREA};
use crate::error::{OptionError, StrategyError};
use crate::models::{FieldOptions, Glyph};

/// Order in which the glyphs of the rectangle are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    X,
    Y,
    /// Top to bottom, then left to right.
    #[default]
    XY,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "X" => Ok(SortOrder::X),
            "Y" => Ok(SortOrder::Y),
            "XY" => Ok(SortOrder::XY),
            other => Err(format!("expected X, Y or XY, got {other}")),
        }
    }
}

/// Options of [`AreaStrategy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaOptions {
    pub x_start: f32,
    pub y_start: f32,
    pub width: f32,
    pub height: f32,
    pub sort_order: SortOrder,
}

impl AreaOptions {
    pub fn parse(options: &FieldOptions) -> Result<Self, OptionError> {
        let required = |key: &str| {
            options
                .number(key)?
                .map(|n| n as f32)
                .ok_or_else(|| OptionError::missing(key))
        };
        let x_start = required("x_start")?;
        let y_start = required("y_start")?;
        non_negative(options, "width")?;
        non_negative(options, "height")?;
        let width = required("width")?;
        let height = required("height")?;

        let sort_order = options
            .string("sortOrder")?
            .map(|s| s.parse::<SortOrder>().map_err(|reason| OptionError::new("sortOrder", reason)))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            x_start,
            y_start,
            width,
            height,
            sort_order,
        })
    }

    /// True when the glyph origin lies in the rectangle, edges included.
    pub fn contains(&self, glyph: &Glyph) -> bool {
        glyph.x >= self.x_start
            && glyph.x <= self.x_start + self.width
            && glyph.y >= self.y_start
            && glyph.y <= self.y_start + self.height
    }
}

/// Reads every glyph whose origin falls in a configured rectangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaStrategy;

impl ExtractionStrategy for AreaStrategy {
    fn name(&self) -> &str {
        AREA
    }

    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
        Ok(Arc::new(AreaOptions::parse(options)?))
    }
}

impl FieldExtractor for AreaOptions {
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        debug!(
            "Field {}: AREA ({:.1}, {:.1}) - ({:.1}, {:.1})",
            ctx.field_name(),
            self.x_start,
            self.y_start,
            self.x_start + self.width,
            self.y_start + self.height
        );

        let mut picked: Vec<&Glyph> = ctx.glyphs.iter().filter(|g| self.contains(g)).collect();
        if picked.is_empty() {
            warn!("Field {}: no text inside the area", ctx.field_name());
            return Ok(None);
        }
        match self.sort_order {
            SortOrder::X => picked.sort_by(by_x),
            SortOrder::Y => picked.sort_by(by_y),
            SortOrder::XY => picked.sort_by(by_y_then_x),
        }

        let text: String = picked.iter().map(|g| g.ch).collect();
        let value = text.trim();
        if value.is_empty() {
            return Ok(None);
        }
        info!("Field {} AREA value: {}", ctx.field_name(), value);
        Ok(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDefinition;
    use pretty_assertions::assert_eq;

    fn rect(field: FieldDefinition) -> FieldDefinition {
        field
            .with_option("x_start", 40)
            .with_option("y_start", 40)
            .with_option("width", 20)
            .with_option("height", 20)
    }

    fn extract(field: FieldDefinition, glyphs: &[Glyph]) -> Option<String> {
        let fields = vec![field];
        let ctx = ExtractionContext::new(&fields[0], &fields, "", glyphs, 600.0, 800.0);
        AreaStrategy.extract(&ctx).unwrap()
    }

    #[test]
    fn test_containment_is_inclusive() {
        let inside = Glyph::new('A', 50.0, 50.0, 5.0, 10.0);
        let outside = Glyph::new('B', 61.0, 50.0, 5.0, 10.0);
        let edge = Glyph::new('C', 60.0, 60.0, 5.0, 10.0);

        let area = AreaOptions::parse(&rect(FieldDefinition::new("f", AREA)).options).unwrap();
        assert!(area.contains(&inside));
        assert!(!area.contains(&outside));
        assert!(area.contains(&edge));

        let value = extract(rect(FieldDefinition::new("f", AREA)), &[outside, inside]);
        assert_eq!(value.as_deref(), Some("A"));
    }

    #[test]
    fn test_sort_orders() {
        let glyphs = vec![
            Glyph::new('b', 45.0, 42.0, 5.0, 5.0),
            Glyph::new('c', 41.0, 55.0, 5.0, 5.0),
            Glyph::new('a', 41.0, 42.0, 5.0, 5.0),
        ];
        let field = rect(FieldDefinition::new("f", AREA));
        assert_eq!(extract(field.clone(), &glyphs).as_deref(), Some("abc"));
        assert_eq!(
            extract(field.clone().with_option("sortOrder", "x"), &glyphs).as_deref(),
            Some("cab")
        );
        assert_eq!(
            extract(field.with_option("sortOrder", "Y"), &glyphs).as_deref(),
            Some("bac")
        );
    }

    #[test]
    fn test_empty_area_yields_nothing() {
        let glyphs = vec![Glyph::new('z', 500.0, 500.0, 5.0, 5.0)];
        assert_eq!(extract(rect(FieldDefinition::new("f", AREA)), &glyphs), None);
    }

    #[test]
    fn test_validation() {
        let missing = FieldDefinition::new("f", AREA)
            .with_option("x_start", 1)
            .with_option("y_start", 1)
            .with_option("width", 1);
        assert_eq!(
            AreaStrategy.validate_options(&missing.options).unwrap_err().key,
            "height"
        );

        let negative = rect(FieldDefinition::new("f", AREA)).with_option("width", -3);
        assert_eq!(
            AreaStrategy.validate_options(&negative.options).unwrap_err().key,
            "width"
        );

        let bad_order = rect(FieldDefinition::new("f", AREA)).with_option("sortOrder", "YX");
        assert!(AreaStrategy.validate_options(&bad_order.options).is_err());

        let text_number = rect(FieldDefinition::new("f", AREA)).with_option("x_start", "40");
        assert!(AreaStrategy.validate_options(&text_number.options).is_err());

        assert!(AreaStrategy.validate_options(&rect(FieldDefinition::new("f", AREA)).options).is_ok());
    }
}
