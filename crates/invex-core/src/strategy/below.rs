//! Value in the lines under a keyword.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::glyphs::{by_y_then_x, find_first_keyword};
use super::{non_negative, positive, ExtractionContext, ExtractionStrategy, FieldExtractor, BELOW};
use crate::error::{OptionError, StrategyError};
use crate::models::{FieldOptions, Glyph};

/// Horizontal window of the search band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XAlignment {
    /// Around the keyword's left edge.
    Left,
    /// Around the keyword's right edge.
    Right,
    /// The full page width.
    #[default]
    Any,
}

impl FromStr for XAlignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEFT" => Ok(XAlignment::Left),
            "RIGHT" => Ok(XAlignment::Right),
            "ANY" => Ok(XAlignment::Any),
            other => Err(format!("expected LEFT, RIGHT or ANY, got {other}")),
        }
    }
}

/// Options of [`BelowStrategy`].
#[derive(Debug, Clone, PartialEq)]
pub struct BelowOptions {
    pub max_lines_below: usize,
    /// Line height as a multiple of the keyword height.
    pub line_height: f32,
    pub x_alignment: XAlignment,
    pub x_tolerance: f32,
    pub stop_at_keywords: Vec<String>,
}

impl BelowOptions {
    pub fn parse(options: &FieldOptions) -> Result<Self, OptionError> {
        let max_lines_below = match options.index("maxLinesBelow")? {
            Some(0) => return Err(OptionError::new("maxLinesBelow", "must be > 0")),
            Some(n) => n,
            None => 1,
        };

        let line_height = match positive(options, "lineHeight")? {
            Some(h) => h,
            None => positive(options, "lineHeightMultiplier")?.unwrap_or(2.0),
        };

        let x_alignment = options
            .string("xAlignment")?
            .map(|s| s.parse::<XAlignment>().map_err(|reason: String| OptionError::new("xAlignment", reason)))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            max_lines_below,
            line_height,
            x_alignment,
            x_tolerance: non_negative(options, "xTolerance")?.unwrap_or(50.0),
            stop_at_keywords: options
                .string_list("stopAtKeywords")?
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        })
    }
}

/// Reads the glyphs in a band directly under the keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct BelowStrategy;

impl ExtractionStrategy for BelowStrategy {
    fn name(&self) -> &str {
        BELOW
    }

    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
        Ok(Arc::new(BelowOptions::parse(options)?))
    }
}

impl FieldExtractor for BelowOptions {
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        if ctx.keywords().is_empty() {
            warn!("Field {} has no keywords", ctx.field_name());
            return Ok(None);
        }
        let Some((keyword, range)) = find_first_keyword(ctx.glyphs, ctx.keywords()) else {
            warn!("Field {}: none of the keywords {:?} found", ctx.field_name(), ctx.keywords());
            return Ok(None);
        };
        let first = ctx.glyphs[range.start];
        let last = ctx.glyphs[range.end - 1];

        let y_start = last.bottom();
        let y_end = y_start + last.height * self.line_height * self.max_lines_below as f32;
        let (x_start, x_end) = match self.x_alignment {
            XAlignment::Left => (first.x - self.x_tolerance, first.x + self.x_tolerance),
            XAlignment::Right => (last.end_x() - self.x_tolerance, last.end_x() + self.x_tolerance),
            XAlignment::Any => (0.0, ctx.page_width),
        };
        debug!(
            "Field {}: BELOW region y {:.1}..{:.1}, x {:.1}..{:.1}",
            ctx.field_name(),
            y_start,
            y_end,
            x_start,
            x_end
        );

        let mut picked: Vec<&Glyph> = ctx
            .glyphs
            .iter()
            .filter(|g| g.y >= y_start && g.y <= y_end && g.x >= x_start && g.x <= x_end)
            .collect();
        if picked.is_empty() {
            warn!("Field {}: no text below keyword '{}'", ctx.field_name(), keyword);
            return Ok(None);
        }
        picked.sort_by(by_y_then_x);

        let mut text = String::new();
        for g in picked {
            if !self.stop_at_keywords.is_empty() {
                let mut candidate = text.clone();
                candidate.push(g.ch);
                if self.stop_at_keywords.iter().any(|kw| candidate.contains(kw.as_str())) {
                    break;
                }
            }
            text.push(g.ch);
        }

        let value = text.trim();
        if value.is_empty() {
            return Ok(None);
        }
        info!("Field {} BELOW value: {}", ctx.field_name(), value);
        Ok(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::glyph::glyph_run;
    use crate::models::FieldDefinition;
    use pretty_assertions::assert_eq;

    /// "开票日期" at y=100 (height 10) with two lines below it.
    fn page() -> Vec<Glyph> {
        let mut glyphs = glyph_run("开票日期", 100.0, 100.0, 10.0, 10.0);
        glyphs.extend(glyph_run("2024-05-01", 100.0, 115.0, 5.0, 10.0));
        glyphs.extend(glyph_run("备注", 400.0, 118.0, 10.0, 10.0));
        glyphs.extend(glyph_run("第二行", 100.0, 135.0, 10.0, 10.0));
        glyphs
    }

    fn field() -> FieldDefinition {
        FieldDefinition::new("date", BELOW).with_keyword("开票日期")
    }

    fn extract(field: FieldDefinition) -> Option<String> {
        let fields = vec![field];
        let glyphs = page();
        let ctx = ExtractionContext::new(&fields[0], &fields, "", &glyphs, 600.0, 800.0);
        BelowStrategy.extract(&ctx).unwrap()
    }

    #[test]
    fn test_any_alignment_spans_page() {
        // Band is 110..130: one line of height 2 * 10.
        assert_eq!(extract(field()).as_deref(), Some("2024-05-01备注"));
    }

    #[test]
    fn test_left_alignment_limits_x() {
        let value = extract(field().with_option("xAlignment", "left"));
        assert_eq!(value.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_right_alignment_uses_keyword_end() {
        // Keyword ends at x=140; tolerance 10 keeps 130..150.
        let value = extract(
            field()
                .with_option("xAlignment", "RIGHT")
                .with_option("xTolerance", 10.0),
        );
        assert_eq!(value.as_deref(), Some("5-01"));
    }

    #[test]
    fn test_more_lines_and_stop_keywords() {
        let two_lines = field()
            .with_option("maxLinesBelow", 2)
            .with_option("xAlignment", "LEFT");
        assert_eq!(extract(two_lines.clone()).as_deref(), Some("2024-05-01第二行"));

        let stopped = two_lines.with_option("stopAtKeywords", vec!["第"]);
        assert_eq!(extract(stopped).as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_line_height_alias() {
        // Multiplier 0.5 gives a band of 110..115, which still holds the date line.
        let value = extract(
            field()
                .with_option("lineHeightMultiplier", 0.5)
                .with_option("xAlignment", "LEFT"),
        );
        assert_eq!(value.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_validation() {
        let cases: Vec<(&str, FieldOptions)> = vec![
            ("maxLinesBelow", [("maxLinesBelow", 0)].into_iter().collect()),
            ("xAlignment", [("xAlignment", "CENTER")].into_iter().collect()),
            ("xTolerance", [("xTolerance", -5.0)].into_iter().collect()),
            ("lineHeight", [("lineHeight", 0.0)].into_iter().collect()),
            ("stopAtKeywords", [("stopAtKeywords", "合计")].into_iter().collect()),
        ];
        for (key, options) in cases {
            assert_eq!(BelowStrategy.validate_options(&options).unwrap_err().key, key);
        }
        assert!(BelowStrategy.validate_options(&FieldOptions::new()).is_ok());
    }
}
