//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// The caller handed in something the engine cannot work with.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The decoder could not produce a glyph stream.
    #[error("PDF error: {0}")]
    PdfParse(#[from] PdfError),

    /// No template has all of its identifiers in the document text.
    #[error("no template matched document {file_name}")]
    TemplateNotMatched { file_name: String },

    /// A field references a strategy that is not registered.
    #[error("field {field} uses unknown strategy {strategy}")]
    StrategyNotFound { field: String, strategy: String },

    /// The strategy rejected the options configured for a field.
    #[error("field {field}: invalid options for strategy {strategy}: {source}")]
    InvalidTemplateOptions {
        field: String,
        strategy: String,
        #[source]
        source: OptionError,
    },

    /// A strategy failed while extracting a field.
    #[error("extraction failed for field {field}: {source}")]
    ExtractionFailed {
        field: String,
        #[source]
        source: StrategyError,
    },

    /// Template store error.
    #[error("template store error: {0}")]
    Template(#[from] TemplateError),

    /// Configuration rejected while building the pipeline.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything uncategorized.
    #[error("internal error: {0}")]
    Internal(String),
}

impl InvexError {
    /// Stable numeric code for transport layers.
    pub fn code(&self) -> u32 {
        match self {
            InvexError::InvalidRequest(_) => 40001,
            InvexError::TemplateNotMatched { .. } => 42201,
            InvexError::StrategyNotFound { .. } => 50011,
            InvexError::InvalidTemplateOptions { .. } => 50012,
            InvexError::ExtractionFailed { .. } => 50013,
            InvexError::PdfParse(_) => 50021,
            InvexError::Template(_)
            | InvexError::Config(_)
            | InvexError::Internal(_) => 50000,
        }
    }

    /// Error kind name, independent of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            InvexError::InvalidRequest(_) => "InvalidRequest",
            InvexError::PdfParse(_) => "PdfParseFailed",
            InvexError::TemplateNotMatched { .. } => "TemplateNotMatched",
            InvexError::StrategyNotFound { .. } => "StrategyNotFound",
            InvexError::InvalidTemplateOptions { .. } => "InvalidTemplateOptions",
            InvexError::ExtractionFailed { .. } => "ExtractionFailed",
            InvexError::Template(_)
            | InvexError::Config(_)
            | InvexError::Internal(_) => "InternalError",
        }
    }
}

/// Errors related to PDF decoding.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to walk the page content.
    #[error("failed to extract glyphs: {0}")]
    GlyphExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by template stores.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Reading or writing a backing file failed.
    #[error("template I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A template document could not be (de)serialized.
    #[error("template JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store does not accept writes.
    #[error("template store is read-only")]
    ReadOnly,

    /// A template without a name cannot be stored.
    #[error("template name must not be blank")]
    BlankName,
}

/// A field option that failed to parse or validate.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("option {key}: {reason}")]
pub struct OptionError {
    pub key: String,
    pub reason: String,
}

impl OptionError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// A required key is absent.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::new(key, "required option is missing")
    }
}

/// Faults raised by a strategy while extracting.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The options stopped parsing between validation and extraction.
    #[error(transparent)]
    Options(#[from] OptionError),

    /// The strategy panicked.
    #[error("strategy panicked: {0}")]
    Panicked(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_taxonomy() {
        let not_matched = InvexError::TemplateNotMatched {
            file_name: "a.pdf".to_string(),
        };
        assert_eq!(not_matched.code(), 42201);
        assert_eq!(not_matched.kind(), "TemplateNotMatched");

        let pdf = InvexError::from(PdfError::NoPages);
        assert_eq!(pdf.code(), 50021);
        assert_eq!(pdf.kind(), "PdfParseFailed");

        let options = InvexError::InvalidTemplateOptions {
            field: "total".to_string(),
            strategy: "AREA".to_string(),
            source: OptionError::missing("width"),
        };
        assert_eq!(options.code(), 50012);
        assert!(options.to_string().contains("width"));

        assert_eq!(InvexError::Internal("boom".to_string()).kind(), "InternalError");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("bad glyph {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload), "bad glyph 7");
    }
}
