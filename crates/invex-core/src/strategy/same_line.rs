//! Value to the right of a keyword on the same line.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use super::glyphs::{by_x, find_first_keyword, keyword_at, trim_start_chars};
use super::{non_negative, pattern, ExtractionContext, ExtractionStrategy, FieldExtractor, SAME_LINE};
use crate::error::{OptionError, StrategyError};
use crate::models::{FieldOptions, Glyph};

/// Options of [`SameLineStrategy`].
#[derive(Debug, Clone)]
pub struct SameLineOptions {
    /// Leading characters stripped from the value (`trimChars`).
    pub trim_chars: Option<String>,
    /// The value is replaced by the first match of this pattern (`valuePattern`).
    pub value_pattern: Option<Regex>,
    /// Largest horizontal distance from the keyword's right edge (`maxDistance`).
    pub max_distance: Option<f32>,
    /// Band half-height as a share of the keyword height (`yTolerance`).
    pub y_tolerance: f32,
}

impl SameLineOptions {
    pub fn parse(options: &FieldOptions) -> Result<Self, OptionError> {
        let value_pattern = options
            .string("valuePattern")?
            .map(|p| pattern::compile("valuePattern", p))
            .transpose()?;

        Ok(Self {
            trim_chars: options.string("trimChars")?.map(str::to_string),
            value_pattern,
            max_distance: non_negative(options, "maxDistance")?,
            y_tolerance: non_negative(options, "yTolerance")?.unwrap_or(0.5),
        })
    }
}

/// Reads the glyphs following the keyword within its line band.
///
/// Collection stops where a keyword of another field of the template
/// starts, so a value never runs into the next label on a dense line.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameLineStrategy;

impl ExtractionStrategy for SameLineStrategy {
    fn name(&self) -> &str {
        SAME_LINE
    }

    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
        Ok(Arc::new(SameLineOptions::parse(options)?))
    }
}

impl FieldExtractor for SameLineOptions {
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        let glyphs = ctx.glyphs;

        if ctx.keywords().is_empty() {
            warn!("Field {} has no keywords", ctx.field_name());
            return Ok(None);
        }
        let Some((keyword, range)) = find_first_keyword(glyphs, ctx.keywords()) else {
            warn!("Field {}: none of the keywords {:?} found", ctx.field_name(), ctx.keywords());
            return Ok(None);
        };

        let anchor = glyphs[range.end - 1];
        let band = anchor.height * self.y_tolerance;
        let y_start = anchor.y - band;
        let y_end = anchor.y + anchor.height + band;
        let x_start = anchor.end_x();
        let in_band = |g: &Glyph| g.y >= y_start && g.y <= y_end;

        let stop = next_keyword_start(glyphs, range.end, &ctx.stop_keywords(), in_band)
            .unwrap_or(glyphs.len());
        debug!(
            "Field {}: keyword '{}' at {:?}, band y {:.1}..{:.1}, stop index {}",
            ctx.field_name(),
            keyword,
            range,
            y_start,
            y_end,
            stop
        );

        let mut picked: Vec<&Glyph> = glyphs[range.end..stop]
            .iter()
            .filter(|&g| in_band(g))
            .filter(|&g| self.max_distance.is_none_or(|max| g.x - x_start <= max))
            .collect();
        if picked.is_empty() {
            warn!("Field {}: no text right of keyword '{}'", ctx.field_name(), keyword);
            return Ok(None);
        }
        picked.sort_by(by_x);

        let raw: String = picked.iter().map(|g| g.ch).collect();
        let trimmed = match &self.trim_chars {
            Some(chars) => trim_start_chars(&raw, chars),
            None => raw.as_str(),
        }
        .trim();
        if trimmed.is_empty() {
            info!("Field {}: nothing between keyword '{}' and the next label", ctx.field_name(), keyword);
            return Ok(None);
        }

        let value = match &self.value_pattern {
            Some(re) => match re.find(trimmed) {
                Some(m) if !m.as_str().trim().is_empty() => m.as_str().to_string(),
                _ => {
                    info!("Field {}: value does not match valuePattern", ctx.field_name());
                    return Ok(None);
                }
            },
            None => trimmed.to_string(),
        };

        info!("Field {} SAME_LINE value: {}", ctx.field_name(), value);
        Ok(Some(value))
    }
}

/// Index of the first in-band glyph, at or after `from`, where one of
/// `stop_keywords` starts with all of its glyphs in band.
fn next_keyword_start<F>(glyphs: &[Glyph], from: usize, stop_keywords: &[&str], in_band: F) -> Option<usize>
where
    F: Fn(&Glyph) -> bool,
{
    if stop_keywords.is_empty() {
        return None;
    }
    (from..glyphs.len()).find(|&i| {
        in_band(&glyphs[i]) && stop_keywords.iter().any(|kw| keyword_at(glyphs, i, kw, &in_band))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::glyph::glyph_run;
    use crate::models::FieldDefinition;
    use pretty_assertions::assert_eq;

    fn extract(fields: &[FieldDefinition], glyphs: &[Glyph]) -> Option<String> {
        let ctx = ExtractionContext::new(&fields[0], fields, "", glyphs, 600.0, 800.0);
        SameLineStrategy.extract(&ctx).unwrap()
    }

    #[test]
    fn test_stops_at_sibling_keyword() {
        let glyphs = glyph_run("Name John Age 42", 10.0, 100.0, 6.0, 10.0);
        let fields = vec![
            FieldDefinition::new("name", SAME_LINE).with_keyword("Name"),
            FieldDefinition::new("age", SAME_LINE).with_keyword("Age"),
        ];
        assert_eq!(extract(&fields, &glyphs).as_deref(), Some("John"));

        let age_first = vec![fields[1].clone(), fields[0].clone()];
        assert_eq!(extract(&age_first, &glyphs).as_deref(), Some("42"));
    }

    /// Like `glyph_run` but keeps a glyph for every space.
    fn spaced_run(text: &str, x: f32, y: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| Glyph::new(ch, x + i as f32 * 6.0, y, 6.0, 10.0))
            .collect()
    }

    #[test]
    fn test_sibling_keyword_on_next_line_does_not_stop() {
        let mut glyphs = spaced_run("Name John Smith", 10.0, 100.0);
        // Band of "Name" is 95..115.
        glyphs.extend(spaced_run("Age 42", 10.0, 120.0));
        let fields = vec![
            FieldDefinition::new("name", SAME_LINE).with_keyword("Name"),
            FieldDefinition::new("age", SAME_LINE).with_keyword("Age"),
        ];
        assert_eq!(extract(&fields, &glyphs).as_deref(), Some("John Smith"));

        let age_first = vec![fields[1].clone(), fields[0].clone()];
        assert_eq!(extract(&age_first, &glyphs).as_deref(), Some("42"));
    }

    #[test]
    fn test_stop_keyword_must_lie_in_band() {
        let fields = vec![
            FieldDefinition::new("name", SAME_LINE).with_keyword("Name"),
            FieldDefinition::new("age", SAME_LINE).with_keyword("Age"),
        ];

        let mut inside = spaced_run("Name John Smith ", 10.0, 100.0);
        inside.extend(spaced_run("Age", 106.0, 112.0));
        assert_eq!(extract(&fields, &inside).as_deref(), Some("John Smith"));

        // Only the 'A' is in band: no stop, and 'g' and 'e' fall outside.
        let mut straddling = spaced_run("Name John Smith ", 10.0, 100.0);
        straddling.push(Glyph::new('A', 106.0, 112.0, 6.0, 10.0));
        straddling.extend(spaced_run("ge", 112.0, 116.0));
        assert_eq!(extract(&fields, &straddling).as_deref(), Some("John Smith A"));
    }

    #[test]
    fn test_trim_chars_and_other_lines() {
        let mut glyphs = glyph_run("交款人:张三", 10.0, 100.0, 12.0, 12.0);
        glyphs.extend(glyph_run("备注 无", 10.0, 130.0, 12.0, 12.0));
        let fields = vec![
            FieldDefinition::new("payer", SAME_LINE)
                .with_keyword("交款人")
                .with_option("trimChars", ":："),
        ];
        assert_eq!(extract(&fields, &glyphs).as_deref(), Some("张三"));
    }

    #[test]
    fn test_first_found_alternative_wins() {
        let glyphs = glyph_run("Payer: Acme", 10.0, 100.0, 6.0, 10.0);
        let fields = vec![
            FieldDefinition::new("payer", SAME_LINE)
                .with_keyword("交款人")
                .with_keyword("Payer")
                .with_option("trimChars", ":"),
        ];
        assert_eq!(extract(&fields, &glyphs).as_deref(), Some("Acme"));
    }

    #[test]
    fn test_value_pattern_selects_or_empties() {
        let glyphs = glyph_run("Total: 128.50 PLN", 10.0, 100.0, 6.0, 10.0);
        let field = FieldDefinition::new("total", SAME_LINE)
            .with_keyword("Total:")
            .with_option("valuePattern", r"[0-9]+\.[0-9]{2}");
        assert_eq!(extract(&[field.clone()], &glyphs).as_deref(), Some("128.50"));

        let strict = field.with_option("valuePattern", r"^\d{4}-\d{2}$");
        assert_eq!(extract(&[strict], &glyphs), None);
    }

    #[test]
    fn test_max_distance_skips_far_glyphs() {
        // Keyword ends at x=34, "AB" starts at 40, "CD" at 76.
        let glyphs = glyph_run("Code AB    CD", 10.0, 100.0, 6.0, 10.0);
        let field = FieldDefinition::new("code", SAME_LINE)
            .with_keyword("Code")
            .with_option("maxDistance", 20.0);
        assert_eq!(extract(&[field], &glyphs).as_deref(), Some("AB"));
    }

    #[test]
    fn test_band_excludes_other_lines() {
        let mut glyphs = glyph_run("Name", 10.0, 100.0, 6.0, 10.0);
        // Height 10, tolerance 0.5: band is 95..115.
        glyphs.extend(glyph_run("Below", 40.0, 120.0, 6.0, 10.0));
        let field = FieldDefinition::new("name", SAME_LINE).with_keyword("Name");
        assert_eq!(extract(&[field], &glyphs), None);
    }

    #[test]
    fn test_missing_keyword_is_not_an_error() {
        let glyphs = glyph_run("Nothing here", 10.0, 100.0, 6.0, 10.0);
        let field = FieldDefinition::new("name", SAME_LINE).with_keyword("Name");
        assert_eq!(extract(&[field], &glyphs), None);
        assert_eq!(extract(&[FieldDefinition::new("none", SAME_LINE)], &glyphs), None);
    }

    #[test]
    fn test_validation() {
        let ok: FieldOptions = [("valuePattern", "\\d+")].into_iter().collect();
        assert!(SameLineStrategy.validate_options(&ok).is_ok());

        let bad_regex: FieldOptions = [("valuePattern", "([0-9")].into_iter().collect();
        assert!(SameLineStrategy.validate_options(&bad_regex).is_err());

        let negative: FieldOptions = [("yTolerance", -1.0)].into_iter().collect();
        assert_eq!(
            SameLineStrategy.validate_options(&negative).unwrap_err().key,
            "yTolerance"
        );

        assert!(SameLineStrategy.validate_options(&FieldOptions::new()).is_ok());
    }
}
