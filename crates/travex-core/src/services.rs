//! Interfaces of the external collaborators.
//!
//! The pipeline never talks to a model, an OCR engine or a PDF library
//! directly. It goes through these traits so that each can be swapped out
//! (or faked in tests).

use std::future::Future;

use image::DynamicImage;
use serde_json::Value;

use crate::error::{PdfError, ServiceError};
use crate::layout::PositionedToken;

/// What the AI extractor is asked to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPayload {
    /// Reconstructed or OCR'd text.
    Text(String),
    /// An encoded image (PNG, JPEG, ...).
    Image { mime_type: String, bytes: Vec<u8> },
}

/// One call to the AI extractor.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Instructions, including chunk position for partial documents.
    pub prompt: String,
    /// The document content.
    pub payload: DocumentPayload,
    /// JSON schema the response must follow.
    pub schema: Value,
}

/// Schema-constrained generative extraction.
///
/// Returns the model's raw response text. It is untrusted: it may be
/// malformed JSON, empty, or contain invented entries.
pub trait ExtractionService {
    fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> impl Future<Output = Result<String, ServiceError>>;
}

impl<T: ExtractionService> ExtractionService for &T {
    fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> impl Future<Output = Result<String, ServiceError>> {
        (**self).extract(request)
    }
}

/// Best-effort text recognition for scanned pages.
pub trait OcrService {
    fn recognize(
        &self,
        image: &DynamicImage,
        progress: &dyn ProgressSink,
    ) -> impl Future<Output = Result<String, ServiceError>>;
}

impl<T: OcrService> OcrService for &T {
    fn recognize(
        &self,
        image: &DynamicImage,
        progress: &dyn ProgressSink,
    ) -> impl Future<Output = Result<String, ServiceError>> {
        (**self).recognize(image, progress)
    }
}

/// Page layout extraction for paginated documents. Pages are 1-indexed.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Positioned text tokens of a page.
    fn page_tokens(&self, page: u32) -> Result<Vec<PositionedToken>, PdfError>;

    /// Render a page as an image for OCR.
    fn render_page(&self, page: u32) -> Result<DynamicImage, PdfError>;
}

/// One-way progress reporting. Calls are fire and forget.
pub trait ProgressSink {
    fn on_progress(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str),
{
    fn on_progress(&self, message: &str) {
        self(message)
    }
}

/// Discards progress messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _message: &str) {}
}
