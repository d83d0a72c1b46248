//! Core library for journey expense extraction.
//!
//! This crate provides:
//! - Line reconstruction from positioned PDF text
//! - Heuristic and CSV statement parsers
//! - Validation of untrusted AI extraction output
//! - Merge-by-max-count reconciliation of extraction passes
//! - Chunked, bounded-concurrency orchestration over pages and files

pub mod error;
pub mod extraction;
pub mod layout;
pub mod models;
#[cfg(feature = "native")]
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod services;
pub mod statement;
pub mod trace;

pub use error::{ExtractionError, PdfError, Result, ServiceError, TravexError};
pub use extraction::{expense_schema, merge, merge_all, validate_response, Extraction};
pub use layout::{reconstruct_lines, PageText, PositionedToken};
pub use models::{ExtractionPass, PassMethod, PassScope, TravelEntry, TravexConfig};
#[cfg(feature = "native")]
pub use ocr::PureOcrService;
pub use pdf::LopdfPageSource;
pub use pipeline::{BatchResult, Document, FileOutcome, InputFile, Pipeline};
pub use services::{
    DocumentPayload, ExtractionRequest, ExtractionService, NoProgress, OcrService, PageSource,
    ProgressSink,
};
pub use statement::{CsvStatementParser, HeuristicParser, StatementParser};
pub use trace::{LogTracer, NoopTracer, Tracer};
