//! Error types for the travex-core library.

use thiserror::Error;

/// Main error type for the travex library.
#[derive(Error, Debug)]
pub enum TravexError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// An external collaborator (AI extraction, OCR) failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// The AI extractor's output for a whole document was unusable.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The document type is not handled.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Processing of a named input file failed.
    #[error("failed to process {name}: {source}")]
    File {
        name: String,
        #[source]
        source: Box<TravexError>,
    },
}

impl TravexError {
    /// Attach the name of the file being processed.
    pub fn in_file(self, name: impl Into<String>) -> Self {
        match self {
            err @ TravexError::File { .. } => err,
            other => TravexError::File {
                name: name.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to read a page's content stream.
    #[error("failed to read page content: {0}")]
    Content(String),

    /// Failed to extract images from PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Failures of the external collaborators.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The AI extraction call failed (network, HTTP status, envelope).
    #[error("AI extraction failed: {0}")]
    Ai(String),

    /// The OCR engine failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The call did not complete in time.
    #[error("{service} call timed out")]
    Timeout { service: &'static str },

    /// The service cannot be used (missing models, missing credentials).
    #[error("{0} is unavailable")]
    Unavailable(String),
}

/// Unusable AI output for a single-document extraction call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The response was not valid JSON.
    #[error("unexpected response format")]
    UnexpectedFormat,

    /// The response had no `expenses` array.
    #[error("no valid expense data found")]
    NoExpenseData,

    /// The `expenses` array was non-empty but every element failed validation.
    #[error("found data but none in correct format ({found} entries rejected)")]
    NoValidEntries { found: usize },
}

/// Result type for the travex library.
pub type Result<T> = std::result::Result<T, TravexError>;
