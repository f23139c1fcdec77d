//! Positioned glyphs as produced by a page decoder.

use serde::{Deserialize, Serialize};

/// One rendered character on a page.
///
/// Coordinates are in page units with `x` growing to the right and `y`
/// measured from the top edge to the glyph baseline, growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    /// The Unicode scalar this glyph renders.
    pub ch: char,
    /// Left edge.
    pub x: f32,
    /// Baseline distance from the top of the page.
    pub y: f32,
    /// Advance width.
    pub width: f32,
    /// Glyph height (font size in page units).
    pub height: f32,
    /// Width of a literal space in the same font and size.
    pub space_width: f32,
}

impl Glyph {
    /// Create a glyph whose space width is derived from its height.
    pub fn new(ch: char, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            ch,
            x,
            y,
            width,
            height,
            space_width: height * 0.25,
        }
    }

    /// Set the space width reported by the font.
    pub fn with_space_width(mut self, space_width: f32) -> Self {
        self.space_width = space_width;
        self
    }

    /// Right edge of the glyph.
    pub fn end_x(&self) -> f32 {
        self.x + self.width
    }

    /// Lowest y covered by the glyph box (`y + height`).
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// A decoded page: its size and every glyph drawn on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub glyphs: Vec<Glyph>,
}

impl Page {
    pub fn new(width: f32, height: f32, glyphs: Vec<Glyph>) -> Self {
        Self {
            width,
            height,
            glyphs,
        }
    }

    /// A page with no glyphs at all.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Concatenate the characters of a glyph run.
pub fn glyph_text<'a, I>(glyphs: I) -> String
where
    I: IntoIterator<Item = &'a Glyph>,
{
    glyphs.into_iter().map(|g| g.ch).collect()
}

/// Lay out `text` as a run of equally spaced glyphs starting at `x`.
///
/// Spaces in `text` advance the pen without emitting a glyph. Used by
/// tests and by fixtures that describe pages as text.
pub fn glyph_run(text: &str, x: f32, y: f32, advance: f32, height: f32) -> Vec<Glyph> {
    let mut glyphs = Vec::with_capacity(text.chars().count());
    let mut pen = x;
    for ch in text.chars() {
        if ch != ' ' {
            glyphs.push(Glyph::new(ch, pen, y, advance, height).with_space_width(advance));
        }
        pen += advance;
    }
    glyphs
}
