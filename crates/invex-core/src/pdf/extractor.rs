//! Glyph extraction using pdf-extract and its lopdf document model.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use tracing::{debug, trace, warn};

use super::{GlyphDecoder, Result};
use crate::error::{panic_message, PdfError};
use crate::models::config::PdfConfig;
use crate::models::{Glyph, Page};

/// Page that is captured; later pages are walked but ignored.
const FIRST_PAGE: u32 = 1;

/// Decoder for text-based PDF files.
#[derive(Debug, Clone)]
pub struct PdfGlyphDecoder {
    try_empty_password: bool,
}

impl PdfGlyphDecoder {
    pub fn new() -> Self {
        Self {
            try_empty_password: true,
        }
    }

    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            try_empty_password: config.try_empty_password,
        }
    }

    fn load(&self, bytes: &[u8]) -> Result<Document> {
        let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if !self.try_empty_password {
                return Err(PdfError::Encrypted);
            }
            doc.decrypt("").map_err(|_| PdfError::Encrypted)?;
            debug!("Decrypted PDF with the empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }
        if page_count > 1 {
            debug!("PDF has {} pages, only page {} is read", page_count, FIRST_PAGE);
        }
        Ok(doc)
    }

    fn decode_inner(&self, bytes: &[u8]) -> Result<Page> {
        let doc = self.load(bytes)?;
        let mut collector = GlyphCollector::default();
        pdf_extract::output_doc(&doc, &mut collector)
            .map_err(|e| PdfError::GlyphExtraction(format!("{e:?}")))?;
        Ok(collector.into_page())
    }
}

impl Default for PdfGlyphDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphDecoder for PdfGlyphDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Page> {
        if bytes.is_empty() {
            return Err(PdfError::Parse("empty input".to_string()));
        }

        // The content interpreter panics on some malformed streams.
        let page = panic::catch_unwind(AssertUnwindSafe(|| self.decode_inner(bytes)))
            .map_err(|payload| PdfError::Parse(panic_message(payload)))??;

        if page.is_empty() {
            warn!("First page has no text glyphs");
        }
        debug!(
            "Decoded page {:.0}x{:.0} with {} glyphs",
            page.width,
            page.height,
            page.glyphs.len()
        );
        Ok(page)
    }
}

/// Output device recording every character shown on the first page.
///
/// Converts PDF user space (origin bottom-left) into page coordinates with
/// the origin at the top-left corner and y growing downward.
///
/// The interpreter reports no font metrics besides advances, so a glyph's
/// space width is the advance of a space shown at the same size on the page.
/// Sizes that never show a space keep `Glyph::new`'s quarter-height guess.
#[derive(Debug, Default)]
struct GlyphCollector {
    current_page: u32,
    left: f64,
    bottom: f64,
    width: f64,
    height: f64,
    glyphs: Vec<Glyph>,
    /// Advance of `' '` keyed by the glyph height's bits.
    space_widths: HashMap<u32, f32>,
}

impl GlyphCollector {
    fn capturing(&self) -> bool {
        self.current_page == FIRST_PAGE
    }

    fn into_page(self) -> Page {
        let space_widths = self.space_widths;
        let glyphs = self
            .glyphs
            .into_iter()
            .map(|g| match space_widths.get(&g.height.to_bits()) {
                Some(&width) => g.with_space_width(width),
                None => g,
            })
            .collect();
        Page::new(self.width as f32, self.height as f32, glyphs)
    }
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.current_page = page_num;
        if self.capturing() {
            self.left = media_box.llx;
            self.bottom = media_box.lly;
            self.width = media_box.urx - media_box.llx;
            self.height = media_box.ury - media_box.lly;
            trace!("Page {} media box {:?}", page_num, (media_box.llx, media_box.lly, media_box.urx, media_box.ury));
        }
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> std::result::Result<(), OutputError> {
        if !self.capturing() || text.is_empty() {
            return Ok(());
        }

        let x = trm.m31 - self.left;
        let y = self.height - (trm.m32 - self.bottom);
        let height = (font_size * trm.m22.abs()) as f32;
        let advance = width * font_size * trm.m11.abs();

        // Ligatures and multi-code-point mappings share one advance.
        let count = text.chars().count() as f64;
        let step = advance / count;
        if text == " " && step > 0.0 {
            self.space_widths.insert(height.to_bits(), step as f32);
        }
        for (i, ch) in text.chars().enumerate() {
            let glyph = Glyph::new(ch, (x + step * i as f64) as f32, y as f32, step as f32, height);
            self.glyphs.push(glyph);
        }
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}
