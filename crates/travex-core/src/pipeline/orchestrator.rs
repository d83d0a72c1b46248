//! Chunk and file orchestration.

use std::path::Path;

use image::ImageFormat;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PdfError, Result, ServiceError, TravexError};
use crate::extraction::{expense_schema, merge, merge_all, validate_response, Extraction};
use crate::layout::{reconstruct_lines, PageText};
use crate::models::{
    ChunkConfig, ExtractionConfig, ExtractionPass, PassMethod, PassScope, TravelEntry,
    TravexConfig,
};
use crate::pdf::LopdfPageSource;
use crate::services::{
    DocumentPayload, ExtractionRequest, ExtractionService, OcrService, PageSource, ProgressSink,
};
use crate::statement::{CsvStatementParser, HeuristicParser, StatementParser};
use crate::trace::{NoopTracer, Tracer};

use super::batch::run_bounded;
use super::chunking::{plan_chunks, DocumentChunk};
use super::prompt::{chunk_prompt, document_prompt};

/// Content of one input file.
pub enum Document {
    /// A tabular statement export.
    Csv(String),
    /// Plain statement text.
    Text(String),
    /// A paginated document (PDF).
    Paged(Box<dyn PageSource>),
    /// A scanned or photographed statement.
    Image { mime_type: String, bytes: Vec<u8> },
}

impl Document {
    fn kind(&self) -> &'static str {
        match self {
            Document::Csv(_) => "csv",
            Document::Text(_) => "text",
            Document::Paged(_) => "paged",
            Document::Image { .. } => "image",
        }
    }
}

/// A named document to process.
pub struct InputFile {
    pub name: String,
    pub document: Document,
}

impl InputFile {
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    /// Read a file and classify it by extension: `csv`, `txt`, `pdf`, or an
    /// image format the `image` crate recognizes. Errors name the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match read_document(path) {
            Ok(document) => Ok(Self::new(name, document)),
            Err(e) => Err(e.in_file(name)),
        }
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let document = match extension.as_str() {
        "csv" => Document::Csv(read_text(path)?),
        "txt" => Document::Text(read_text(path)?),
        "pdf" => Document::Paged(Box::new(LopdfPageSource::open(path)?)),
        _ => match ImageFormat::from_extension(&extension) {
            Some(format) => Document::Image {
                mime_type: format.to_mime_type().to_string(),
                bytes: std::fs::read(path)?,
            },
            None if extension.is_empty() => {
                return Err(TravexError::UnsupportedFormat("no file extension".to_string()));
            }
            None => return Err(TravexError::UnsupportedFormat(format!(".{}", extension))),
        },
    };
    debug!("{} read as {} document", path.display(), document.kind());
    Ok(document)
}

/// Statement text, with invalid UTF-8 replaced.
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Entries extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub name: String,
    pub entries: Vec<TravelEntry>,
}

/// Result of a multi-file run, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub files: Vec<FileOutcome>,
}

impl BatchResult {
    /// Entries of every file, ordered by date then amount.
    pub fn all_entries(&self) -> Vec<TravelEntry> {
        let mut entries: Vec<TravelEntry> = self
            .files
            .iter()
            .flat_map(|f| f.entries.iter().copied())
            .collect();
        entries.sort();
        entries
    }

    /// Sum of all amounts.
    pub fn total_amount(&self) -> Decimal {
        self.files
            .iter()
            .flat_map(|f| f.entries.iter())
            .map(|e| e.amount)
            .sum()
    }
}

/// Prefixes progress messages with the file they belong to.
struct FileProgress<'a> {
    name: &'a str,
    inner: &'a dyn ProgressSink,
}

impl ProgressSink for FileProgress<'_> {
    fn on_progress(&self, message: &str) {
        self.inner.on_progress(&format!("{}: {}", self.name, message));
    }
}

/// Drives extraction for files, pages and chunks.
///
/// Paginated documents are chunked and sent to the AI extractor in bounded
/// batches; the heuristic parser runs once over the full text and the two are
/// reconciled. Sparse pages are OCR'd first. CSV exports skip both and go
/// through the CSV parser.
pub struct Pipeline<A, O> {
    ai: A,
    ocr: O,
    tracer: Box<dyn Tracer>,
    extraction: ExtractionConfig,
    chunking: ChunkConfig,
    min_text_length: usize,
    heuristic: HeuristicParser,
    csv: CsvStatementParser,
}

impl<A: ExtractionService, O: OcrService> Pipeline<A, O> {
    /// Create a pipeline with default settings.
    pub fn new(ai: A, ocr: O) -> Self {
        let config = TravexConfig::default();
        Self {
            ai,
            ocr,
            tracer: Box::new(NoopTracer),
            extraction: config.extraction,
            chunking: config.chunking,
            min_text_length: config.ocr.min_text_length,
            heuristic: HeuristicParser::new(),
            csv: CsvStatementParser::new(),
        }
    }

    /// Create a pipeline from a loaded configuration.
    pub fn from_config(ai: A, ocr: O, config: &TravexConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            extraction: config.extraction.clone(),
            chunking: config.chunking,
            min_text_length: config.ocr.min_text_length,
            ..Self::new(ai, ocr)
        })
    }

    /// Set the span tracer.
    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Replace the heuristic parser.
    pub fn with_heuristic(mut self, parser: HeuristicParser) -> Self {
        self.heuristic = parser;
        self
    }

    /// Enable or disable AI extraction.
    pub fn with_ai(mut self, enabled: bool) -> Self {
        self.extraction.use_ai = enabled;
        self
    }

    /// Process several files with at most `max_concurrent_files` in flight.
    ///
    /// Fails fast: the first failure in submission order is returned and no
    /// further batch of files is started.
    pub async fn process_files(
        &self,
        files: Vec<InputFile>,
        progress: &dyn ProgressSink,
    ) -> Result<BatchResult> {
        info!("Processing {} files", files.len());
        let tasks = files
            .into_iter()
            .map(move |file| move || self.process_file(file, progress));
        let files = run_bounded(tasks, self.extraction.max_concurrent_files).await?;
        Ok(BatchResult { files })
    }

    /// Process one file. Errors name the file.
    pub async fn process_file(
        &self,
        file: InputFile,
        progress: &dyn ProgressSink,
    ) -> Result<FileOutcome> {
        let InputFile { name, document } = file;
        let span = self
            .tracer
            .begin("file", &[("name", name.clone()), ("kind", document.kind().to_string())]);

        let sink = FileProgress {
            name: &name,
            inner: progress,
        };
        let result = self.process_document(document, &sink).await;
        span.end();

        match result {
            Ok(entries) => {
                info!("{}: {} journeys", name, entries.len());
                Ok(FileOutcome { name, entries })
            }
            Err(e) => {
                warn!("{}: {}", name, e);
                Err(e.in_file(name))
            }
        }
    }

    /// Extract entries from a document of any supported kind.
    pub async fn process_document(
        &self,
        document: Document,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        let entries = match document {
            Document::Csv(text) => self.csv.parse(&text),
            Document::Text(text) => self.process_text(text, progress).await?,
            Document::Paged(source) => self.process_pages(source.as_ref(), progress).await?,
            Document::Image { mime_type, bytes } => {
                self.process_image(mime_type, bytes, progress).await?
            }
        };

        progress.on_progress(&journeys_found(entries.len()));
        Ok(entries)
    }

    /// Chunked AI extraction plus one heuristic pass over a paginated document.
    pub async fn process_pages(
        &self,
        source: &dyn PageSource,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        let pages = self.read_pages(source, progress).await?;
        let full_text = pages
            .iter()
            .map(PageText::text)
            .collect::<Vec<_>>()
            .join("\n\n");
        let heuristic = self.heuristic.parse_pass(&full_text);

        let ai_entries = if self.extraction.use_ai {
            self.extract_chunks(pages, progress).await?
        } else {
            Vec::new()
        };

        let merged = merge(&ai_entries, &heuristic.entries);
        debug!(
            "Merged {} AI and {} heuristic entries into {}",
            ai_entries.len(),
            heuristic.len(),
            merged.len()
        );
        Ok(merged)
    }

    /// Run the AI extractor over pages in chunks and fold the passes.
    pub async fn extract_chunks(
        &self,
        pages: Vec<PageText>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        let chunks = plan_chunks(pages, &self.chunking);
        let total = chunks.len();
        debug!("Split document into {} chunks", total);

        let tasks = chunks
            .iter()
            .map(move |chunk| move || self.extract_chunk(chunk, total, progress));
        let passes = run_bounded(tasks, self.extraction.max_concurrent_chunks).await?;

        Ok(merge_all(passes.iter().map(|p| p.entries.as_slice())))
    }

    async fn extract_chunk(
        &self,
        chunk: &DocumentChunk,
        total: usize,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionPass> {
        progress.on_progress(&format!("Extracting chunk {} of {}", chunk.index + 1, total));

        let request = ExtractionRequest {
            prompt: chunk_prompt(chunk.index, total, chunk.first_page, chunk.last_page()),
            payload: DocumentPayload::Text(chunk.text()),
            schema: expense_schema(),
        };

        let span = self.tracer.begin(
            "chunk",
            &[
                ("index", (chunk.index + 1).to_string()),
                ("total", total.to_string()),
                ("pages", format!("{}-{}", chunk.first_page, chunk.last_page())),
            ],
        );
        let response = self.ai.extract(&request).await;
        span.end();

        let entries = match validate_response(&response?) {
            Extraction::Malformed(reason) => {
                warn!(
                    "Chunk {} of {} returned unusable output ({:?}), counting it as empty",
                    chunk.index + 1,
                    total,
                    reason
                );
                Vec::new()
            }
            extraction => extraction.into_chunk_entries(),
        };

        debug!("Chunk {} of {}: {} entries", chunk.index + 1, total, entries.len());
        Ok(ExtractionPass::new(
            PassMethod::Ai,
            PassScope::Chunk(chunk.index),
            entries,
        ))
    }

    /// Reconstruct page text, falling back to OCR for sparse pages.
    async fn read_pages(
        &self,
        source: &dyn PageSource,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<PageText>> {
        let count = source.page_count();
        if count == 0 {
            return Err(PdfError::NoPages.into());
        }

        let mut pages = Vec::with_capacity(count as usize);
        for page in 1..=count {
            let tokens = source.page_tokens(page).unwrap_or_else(|e| {
                warn!("Page {}: {}", page, e);
                Vec::new()
            });
            let mut text = reconstruct_lines(&tokens, self.extraction.line_tolerance);

            if text.char_len() < self.min_text_length {
                text = self.ocr_page(source, page, text, progress).await?;
            }
            pages.push(text);
        }

        Ok(pages)
    }

    async fn ocr_page(
        &self,
        source: &dyn PageSource,
        page: u32,
        text: PageText,
        progress: &dyn ProgressSink,
    ) -> Result<PageText> {
        debug!("Page {} has {} characters of text, trying OCR", page, text.char_len());
        let image = match source.render_page(page) {
            Ok(image) => image,
            Err(e) => {
                warn!("Page {} cannot be rendered for OCR: {}", page, e);
                return Ok(text);
            }
        };

        progress.on_progress(&format!("Running OCR on page {}", page));
        let Some(recognized) = self.recognize(&image, page.to_string(), progress).await? else {
            return Ok(text);
        };

        let recognized = PageText::from_text(&recognized);
        if recognized.char_len() > text.char_len() {
            Ok(recognized)
        } else {
            Ok(text)
        }
    }

    /// OCR an image. `None` when the OCR service is unavailable.
    async fn recognize(
        &self,
        image: &image::DynamicImage,
        label: String,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>> {
        let span = self.tracer.begin("ocr", &[("page", label)]);
        let result = self.ocr.recognize(image, progress).await;
        span.end();

        match result {
            Ok(text) => Ok(Some(text)),
            Err(ServiceError::Unavailable(what)) => {
                warn!("{} is unavailable, continuing without OCR", what);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Single-document AI extraction plus a heuristic pass over OCR text.
    async fn process_image(
        &self,
        mime_type: String,
        bytes: Vec<u8>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        let image = image::load_from_memory(&bytes)?;

        progress.on_progress("Running OCR on image");
        let ocr_text = self
            .recognize(&image, "image".to_string(), progress)
            .await?
            .unwrap_or_default();
        let heuristic = self.heuristic.parse(&ocr_text);

        let ai_entries = if self.extraction.use_ai {
            self.extract_document(DocumentPayload::Image { mime_type, bytes }, progress)
                .await?
        } else {
            Vec::new()
        };

        Ok(merge(&ai_entries, &heuristic))
    }

    async fn process_text(
        &self,
        text: String,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        let heuristic = self.heuristic.parse(&text);
        let ai_entries = if self.extraction.use_ai {
            self.extract_document(DocumentPayload::Text(text), progress)
                .await?
        } else {
            Vec::new()
        };

        Ok(merge(&ai_entries, &heuristic))
    }

    /// One AI call for a whole document. Unusable output is an error.
    async fn extract_document(
        &self,
        payload: DocumentPayload,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TravelEntry>> {
        progress.on_progress("Extracting document");
        let request = ExtractionRequest {
            prompt: document_prompt(),
            payload,
            schema: expense_schema(),
        };

        let span = self.tracer.begin("document", &[]);
        let response = self.ai.extract(&request).await;
        span.end();

        let entries = validate_response(&response?).into_document_entries()?;
        debug!("Document extraction returned {} entries", entries.len());
        Ok(entries)
    }
}

fn journeys_found(count: usize) -> String {
    match count {
        1 => "Found 1 journey".to_string(),
        n => format!("Found {} journeys", n),
    }
}
