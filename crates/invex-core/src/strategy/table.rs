//! Column values of a table region.
//!
//! Rows come from a sweep over y-sorted glyphs; columns come from gaps in
//! the sorted x coordinates of every glyph in the region. The first row is
//! the header.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{positive, ExtractionContext, ExtractionStrategy, FieldExtractor, TABLE};
use crate::error::{OptionError, StrategyError};
use crate::models::{FieldOptions, Glyph};

/// Horizontal gap between x coordinates that separates two columns.
pub const COLUMN_GAP_THRESHOLD: f32 = 20.0;

/// Options of [`TableStrategy`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    pub column_index: Option<usize>,
    pub header_keyword: Option<String>,
    /// Data row, not counting the header.
    pub row_index: Option<usize>,
    pub table_start_y: Option<f32>,
    pub table_end_y: Option<f32>,
    pub row_tolerance: f32,
    pub column_delimiter: String,
}

impl TableOptions {
    pub fn parse(options: &FieldOptions) -> Result<Self, OptionError> {
        let column_index = options.index("columnIndex")?;
        let header_keyword = match options.string("headerKeyword")? {
            Some(kw) if kw.trim().is_empty() => {
                return Err(OptionError::new("headerKeyword", "must not be blank"));
            }
            other => other.map(str::to_string),
        };
        if column_index.is_none() && header_keyword.is_none() {
            return Err(OptionError::new(
                "columnIndex",
                "either columnIndex or headerKeyword is required",
            ));
        }

        let table_start_y = options.number("tableStartY")?.map(|n| n as f32);
        let table_end_y = options.number("tableEndY")?.map(|n| n as f32);
        if let (Some(start), Some(end)) = (table_start_y, table_end_y) {
            if start > end {
                return Err(OptionError::new(
                    "tableStartY",
                    format!("must not exceed tableEndY ({start} > {end})"),
                ));
            }
        }

        Ok(Self {
            column_index,
            header_keyword,
            row_index: options.index("rowIndex")?,
            table_start_y,
            table_end_y,
            row_tolerance: positive(options, "rowTolerance")?.unwrap_or(5.0),
            column_delimiter: options.string("columnDelimiter")?.unwrap_or(",").to_string(),
        })
    }
}

/// Reads one cell, or one whole column, of a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStrategy;

impl ExtractionStrategy for TableStrategy {
    fn name(&self) -> &str {
        TABLE
    }

    fn prepare(&self, options: &FieldOptions) -> Result<Arc<dyn FieldExtractor>, OptionError> {
        Ok(Arc::new(TableOptions::parse(options)?))
    }
}

impl FieldExtractor for TableOptions {
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<String>, StrategyError> {
        let region: Vec<&Glyph> = if self.table_start_y.is_some() || self.table_end_y.is_some() {
            let start = self.table_start_y.unwrap_or(0.0);
            let end = self.table_end_y.unwrap_or(ctx.page_height);
            ctx.glyphs.iter().filter(|g| g.y >= start && g.y <= end).collect()
        } else {
            ctx.glyphs.iter().collect()
        };
        if region.is_empty() {
            warn!("Field {}: no text in the table region", ctx.field_name());
            return Ok(None);
        }

        let rows = group_rows(region, self.row_tolerance);
        let boundaries = column_boundaries(&rows);
        debug!(
            "Field {}: table has {} rows, {} columns",
            ctx.field_name(),
            rows.len(),
            boundaries.len() - 1
        );

        let column = match (self.column_index, self.header_keyword.as_deref()) {
            (Some(index), _) => index,
            (None, Some(keyword)) => match header_column(&rows, &boundaries, keyword) {
                Some(index) => {
                    debug!("Header '{}' is column {}", keyword, index);
                    index
                }
                None => {
                    warn!("Field {}: header keyword '{}' not found", ctx.field_name(), keyword);
                    return Ok(None);
                }
            },
            (None, None) => return Ok(None),
        };

        let value = match self.row_index {
            Some(row) => match rows.get(row + 1) {
                Some(cells) => cell_text(cells, column, &boundaries),
                None => {
                    warn!(
                        "Field {}: row {} out of range ({} data rows)",
                        ctx.field_name(),
                        row,
                        rows.len() - 1
                    );
                    return Ok(None);
                }
            },
            None => {
                let values: Vec<String> = rows
                    .iter()
                    .skip(1)
                    .filter_map(|cells| cell_text(cells, column, &boundaries))
                    .filter(|v| !v.is_empty())
                    .collect();
                Some(values.join(&self.column_delimiter))
            }
        };

        match value {
            Some(v) if !v.is_empty() => {
                info!("Field {} TABLE value: {}", ctx.field_name(), v);
                Ok(Some(v))
            }
            _ => Ok(None),
        }
    }
}

/// Cluster glyphs into rows, top to bottom, each row sorted by x.
///
/// A new row starts whenever a glyph's y is more than `tolerance` away from
/// the previous glyph's y.
pub fn group_rows(mut glyphs: Vec<&Glyph>, tolerance: f32) -> Vec<Vec<&Glyph>> {
    glyphs.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut rows: Vec<Vec<&Glyph>> = Vec::new();
    let mut current: Vec<&Glyph> = Vec::new();
    let mut last_y: Option<f32> = None;

    for glyph in glyphs {
        if let Some(y) = last_y {
            if (glyph.y - y).abs() > tolerance && !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
        }
        last_y = Some(glyph.y);
        current.push(glyph);
    }
    if !current.is_empty() {
        rows.push(current);
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Column edges: `0`, the midpoint of every x gap wider than
/// [`COLUMN_GAP_THRESHOLD`], then `+inf`.
pub fn column_boundaries(rows: &[Vec<&Glyph>]) -> Vec<f32> {
    let mut xs: Vec<f32> = rows.iter().flatten().map(|g| g.x).collect();
    xs.sort_by(f32::total_cmp);

    let mut boundaries = vec![0.0];
    for pair in xs.windows(2) {
        if pair[1] - pair[0] > COLUMN_GAP_THRESHOLD {
            boundaries.push((pair[0] + pair[1]) / 2.0);
        }
    }
    boundaries.push(f32::INFINITY);
    boundaries
}

/// Column of the header glyph where `keyword` starts.
///
/// `None` when the header row does not contain the keyword; column 0 when
/// the glyph lies outside every column.
fn header_column(rows: &[Vec<&Glyph>], boundaries: &[f32], keyword: &str) -> Option<usize> {
    let header = rows.first()?;
    let text: String = header.iter().map(|g| g.ch).collect();
    let byte_index = text.find(keyword)?;
    let glyph_index = text[..byte_index].chars().count();
    let x = header.get(glyph_index)?.x;

    Some(
        boundaries
            .windows(2)
            .position(|edge| x >= edge[0] && x < edge[1])
            .unwrap_or(0),
    )
}

/// Trimmed text of the row's glyphs inside column `column`, or `None` when
/// the column does not exist.
fn cell_text(row: &[&Glyph], column: usize, boundaries: &[f32]) -> Option<String> {
    let start = *boundaries.get(column)?;
    let end = *boundaries.get(column + 1)?;
    let text: String = row
        .iter()
        .filter(|g| g.x >= start && g.x < end)
        .map(|g| g.ch)
        .collect();
    Some(text.trim().to_string())
}
