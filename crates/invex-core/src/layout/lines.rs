//! Reading-order line reconstruction from an unordered glyph stream.
//!
//! Glyphs are swept top-to-bottom; a glyph joins the running line while its
//! baseline stays within a tolerance of the line's mean baseline. The
//! tolerance scales with the tallest glyph seen so far, clamped so that tiny
//! fonts still absorb jitter and huge fonts do not swallow neighbouring lines.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::models::Glyph;

/// A reconstructed visual line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Glyphs sorted left to right.
    pub glyphs: Vec<Glyph>,
    /// Rendered text with inferred word spaces, trimmed and collapsed.
    pub text: String,
    /// Mean baseline of the glyphs.
    pub y: f32,
    /// Tallest glyph in the line.
    pub height: f32,
}

/// Clusters glyphs into lines and renders them as text.
#[derive(Debug, Clone)]
pub struct LineReconstructor {
    tolerance_factor: f32,
    min_tolerance: f32,
    max_tolerance: f32,
    space_factor: f32,
    min_space_gap: f32,
}

impl LineReconstructor {
    /// Create a reconstructor with the default constants.
    pub fn new() -> Self {
        Self {
            tolerance_factor: 0.6,
            min_tolerance: 1.5,
            max_tolerance: 6.0,
            space_factor: 0.35,
            min_space_gap: 1.0,
        }
    }

    /// Set the share of line height accepted as baseline jitter.
    pub fn with_tolerance_factor(mut self, factor: f32) -> Self {
        self.tolerance_factor = factor;
        self
    }

    /// Set the clamp range of the line tolerance.
    pub fn with_tolerance_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_tolerance = min;
        self.max_tolerance = max.max(min);
        self
    }

    /// Set the word-gap rule: `gap > max(space_width * factor, min_gap)`.
    pub fn with_space_gap(mut self, factor: f32, min_gap: f32) -> Self {
        self.space_factor = factor;
        self.min_space_gap = min_gap;
        self
    }

    /// Baseline tolerance for a line whose tallest glyph is `line_height`.
    pub fn tolerance(&self, line_height: f32) -> f32 {
        (line_height * self.tolerance_factor).clamp(self.min_tolerance, self.max_tolerance)
    }

    /// Cluster glyphs into lines, top to bottom. Blank lines are dropped.
    pub fn lines(&self, glyphs: &[Glyph]) -> Vec<Line> {
        if glyphs.is_empty() {
            return Vec::new();
        }

        let mut sorted = glyphs.to_vec();
        sorted.sort_by(reading_cmp);

        let mut lines = Vec::new();
        let mut current: Vec<Glyph> = Vec::new();
        let mut running_y = 0.0f32;
        let mut line_height = 0.0f32;

        for glyph in sorted {
            if !current.is_empty() && (glyph.y - running_y).abs() > self.tolerance(line_height) {
                if let Some(line) = self.close_line(std::mem::take(&mut current), running_y, line_height) {
                    lines.push(line);
                }
            }

            if current.is_empty() {
                running_y = glyph.y;
                line_height = glyph.height;
            } else {
                running_y += (glyph.y - running_y) / (current.len() as f32 + 1.0);
                line_height = line_height.max(glyph.height);
            }
            current.push(glyph);
        }

        if let Some(line) = self.close_line(current, running_y, line_height) {
            lines.push(line);
        }

        debug!("Reconstructed {} lines from {} glyphs", lines.len(), glyphs.len());
        lines
    }

    /// Full page text: non-empty lines joined by `\n`.
    pub fn text(&self, glyphs: &[Glyph]) -> String {
        self.lines(glyphs)
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Glyphs re-ordered line by line, each line left to right.
    pub fn reading_order(&self, glyphs: &[Glyph]) -> Vec<Glyph> {
        self.lines(glyphs)
            .into_iter()
            .flat_map(|line| line.glyphs)
            .collect()
    }

    fn close_line(&self, mut glyphs: Vec<Glyph>, y: f32, height: f32) -> Option<Line> {
        if glyphs.is_empty() {
            return None;
        }
        glyphs.sort_by(horizontal_cmp);

        let text = self.render(&glyphs);
        if text.is_empty() {
            trace!("Dropping blank line at y={:.1}", y);
            return None;
        }

        Some(Line {
            glyphs,
            text,
            y,
            height,
        })
    }

    fn render(&self, glyphs: &[Glyph]) -> String {
        let mut raw = String::with_capacity(glyphs.len() * 2);
        let mut prev: Option<&Glyph> = None;

        for glyph in glyphs {
            if let Some(p) = prev {
                let gap = glyph.x - p.end_x();
                if gap > (p.space_width * self.space_factor).max(self.min_space_gap) {
                    raw.push(' ');
                }
            }
            raw.push(glyph.ch);
            prev = Some(glyph);
        }

        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for LineReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order by (y, x), ties broken by content so the result does not
/// depend on input order.
fn reading_cmp(a: &Glyph, b: &Glyph) -> Ordering {
    a.y.total_cmp(&b.y)
        .then(a.x.total_cmp(&b.x))
        .then(a.ch.cmp(&b.ch))
        .then(a.width.total_cmp(&b.width))
        .then(a.height.total_cmp(&b.height))
}

fn horizontal_cmp(a: &Glyph, b: &Glyph) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.ch.cmp(&b.ch))
        .then(a.width.total_cmp(&b.width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::glyph::{glyph_run, glyph_text};
    use pretty_assertions::assert_eq;

    fn sample_page() -> Vec<Glyph> {
        let mut glyphs = glyph_run("INVOICE No 42", 10.0, 20.0, 6.0, 10.0);
        // Baseline jitter on the second line stays within tolerance.
        let mut second = glyph_run("Total: 128.50", 10.0, 40.0, 6.0, 10.0);
        second[3].y += 1.2;
        second[7].y -= 0.8;
        glyphs.extend(second);
        glyphs.extend(glyph_run("交款人:张三", 10.0, 60.0, 12.0, 12.0));
        glyphs
    }

    /// Deterministic Fisher-Yates with a small LCG.
    fn shuffled(glyphs: &[Glyph], seed: u64) -> Vec<Glyph> {
        let mut out = glyphs.to_vec();
        let mut state = seed;
        for i in (1..out.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            out.swap(i, j);
        }
        out
    }

    #[test]
    fn test_reconstructs_lines_in_reading_order() {
        let text = LineReconstructor::new().text(&sample_page());
        assert_eq!(text, "INVOICE No 42\nTotal: 128.50\n交款人:张三");
    }

    #[test]
    fn test_output_is_independent_of_input_order() {
        let reconstructor = LineReconstructor::new();
        let glyphs = sample_page();
        let expected = reconstructor.text(&glyphs);

        let mut reversed = glyphs.clone();
        reversed.reverse();
        assert_eq!(reconstructor.text(&reversed), expected);

        for seed in [1, 7, 42, 1234, 98765] {
            assert_eq!(reconstructor.text(&shuffled(&glyphs, seed)), expected);
        }
    }

    #[test]
    fn test_tolerance_is_clamped() {
        let reconstructor = LineReconstructor::new();
        assert_eq!(reconstructor.tolerance(1.0), 1.5);
        assert_eq!(reconstructor.tolerance(5.0), 3.0);
        assert_eq!(reconstructor.tolerance(40.0), 6.0);
    }

    #[test]
    fn test_baseline_shift_beyond_tolerance_splits_lines() {
        let mut glyphs = glyph_run("ab", 0.0, 10.0, 5.0, 2.0);
        // Height 2 gives tolerance 1.5; a 2.0 shift starts a new line.
        glyphs.push(Glyph::new('c', 10.0, 12.0, 5.0, 2.0));
        let lines = LineReconstructor::new().lines(&glyphs);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "ab");
        assert_eq!(lines[1].text, "c");
    }

    #[test]
    fn test_running_mean_and_height() {
        let glyphs = vec![
            Glyph::new('a', 0.0, 10.0, 5.0, 8.0),
            Glyph::new('b', 5.0, 11.0, 5.0, 12.0),
            Glyph::new('c', 10.0, 12.0, 5.0, 10.0),
        ];
        let lines = LineReconstructor::new().lines(&glyphs);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].y - 11.0).abs() < 1e-5);
        assert_eq!(lines[0].height, 12.0);
    }

    #[test]
    fn test_synthesizes_spaces_from_gaps() {
        let glyphs = vec![
            Glyph::new('a', 0.0, 10.0, 5.0, 10.0).with_space_width(4.0),
            // gap 1.2 <= max(4.0 * 0.35, 1.0) = 1.4: no space
            Glyph::new('b', 6.2, 10.0, 5.0, 10.0).with_space_width(4.0),
            // gap 2.0 > 1.4: space
            Glyph::new('c', 13.2, 10.0, 5.0, 10.0).with_space_width(4.0),
        ];
        assert_eq!(LineReconstructor::new().text(&glyphs), "ab c");
    }

    #[test]
    fn test_collapses_whitespace_and_drops_blank_lines() {
        let mut glyphs = vec![
            Glyph::new(' ', 0.0, 10.0, 3.0, 10.0),
            Glyph::new('x', 3.0, 10.0, 3.0, 10.0),
            Glyph::new(' ', 6.0, 10.0, 3.0, 10.0),
            Glyph::new(' ', 9.0, 10.0, 3.0, 10.0),
            Glyph::new('y', 12.0, 10.0, 3.0, 10.0),
        ];
        glyphs.push(Glyph::new(' ', 0.0, 40.0, 3.0, 10.0));
        let reconstructor = LineReconstructor::new();
        assert_eq!(reconstructor.text(&glyphs), "x y");
        assert_eq!(reconstructor.lines(&glyphs).len(), 1);
    }

    #[test]
    fn test_reading_order_glyphs() {
        let mut glyphs = glyph_run("World", 10.0, 30.0, 6.0, 10.0);
        glyphs.extend(glyph_run("Hello", 10.0, 10.0, 6.0, 10.0));
        glyphs.reverse();
        let ordered = LineReconstructor::new().reading_order(&glyphs);
        assert_eq!(glyph_text(&ordered), "HelloWorld");
    }

    #[test]
    fn test_empty_input() {
        let reconstructor = LineReconstructor::new();
        assert!(reconstructor.lines(&[]).is_empty());
        assert_eq!(reconstructor.text(&[]), "");
    }
}
