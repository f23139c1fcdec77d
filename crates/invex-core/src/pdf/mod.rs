//! PDF decoding into positioned glyphs.

#[cfg(feature = "native")]
mod extractor;

#[cfg(feature = "native")]
pub use extractor::PdfGlyphDecoder;

use crate::error::PdfError;
use crate::models::Page;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Turns raw document bytes into the glyphs of its first page.
///
/// A page without text is `Ok` with no glyphs; only a document that cannot
/// be read at all is an error.
pub trait GlyphDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Page>;
}

impl<F> GlyphDecoder for F
where
    F: Fn(&[u8]) -> Result<Page> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> Result<Page> {
        self(bytes)
    }
}
