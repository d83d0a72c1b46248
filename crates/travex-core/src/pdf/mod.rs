//! PDF page source.

mod extractor;

pub use extractor::LopdfPageSource;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;
