//! Glyph-sequence helpers shared by the strategies.

use std::cmp::Ordering;
use std::ops::Range;

use crate::models::Glyph;

/// Index range of the first run of glyphs spelling `keyword` exactly.
///
/// The match is a sliding window over the sequence as given: one glyph per
/// keyword character, no skipping. An empty keyword never matches.
pub fn find_keyword(glyphs: &[Glyph], keyword: &str) -> Option<Range<usize>> {
    let chars: Vec<char> = keyword.chars().collect();
    if chars.is_empty() || chars.len() > glyphs.len() {
        return None;
    }
    (0..=glyphs.len() - chars.len())
        .find(|&start| spells_at(glyphs, start, &chars))
        .map(|start| start..start + chars.len())
}

/// The first keyword, in list order, that occurs in the sequence.
pub fn find_first_keyword<'k>(
    glyphs: &[Glyph],
    keywords: &'k [String],
) -> Option<(&'k str, Range<usize>)> {
    keywords
        .iter()
        .find_map(|kw| find_keyword(glyphs, kw).map(|range| (kw.as_str(), range)))
}

/// True when the glyphs starting at `start` spell `keyword` and every one
/// of them satisfies `accept`.
pub fn keyword_at<F>(glyphs: &[Glyph], start: usize, keyword: &str, accept: F) -> bool
where
    F: Fn(&Glyph) -> bool,
{
    let mut count = 0;
    for ch in keyword.chars() {
        match glyphs.get(start + count) {
            Some(g) if g.ch == ch && accept(g) => count += 1,
            _ => return false,
        }
    }
    count > 0
}

fn spells_at(glyphs: &[Glyph], start: usize, chars: &[char]) -> bool {
    glyphs[start..start + chars.len()]
        .iter()
        .zip(chars)
        .all(|(g, c)| g.ch == *c)
}

/// Strip every leading character that appears in `chars`.
pub fn trim_start_chars<'a>(value: &'a str, chars: &str) -> &'a str {
    value.trim_start_matches(|c: char| chars.contains(c))
}

pub fn by_x(a: &&Glyph, b: &&Glyph) -> Ordering {
    a.x.total_cmp(&b.x)
}

pub fn by_y(a: &&Glyph, b: &&Glyph) -> Ordering {
    a.y.total_cmp(&b.y)
}

pub fn by_y_then_x(a: &&Glyph, b: &&Glyph) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}
