//! Process command - extract journeys from statement files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use console::style;
use glob::glob;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use travex_core::{
    BatchResult, Document, ExtractionRequest, ExtractionService, FileOutcome, InputFile,
    LogTracer, OcrService, Pipeline, ProgressSink, PureOcrService, ServiceError,
    TravelEntry, TravexConfig,
};

use super::config::load_config;
use crate::gemini::GeminiClient;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input files or glob patterns (PDF, CSV, TXT or image)
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// OCR model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Skip AI extraction and use only the heuristic and CSV parsers
    #[arg(long)]
    no_ai: bool,

    /// Log timings of pipeline stages
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text listing
    Text,
}

/// AI backend selected at startup.
enum AiBackend {
    Gemini(GeminiClient),
    Disabled,
}

impl ExtractionService for AiBackend {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, ServiceError> {
        match self {
            AiBackend::Gemini(client) => client.extract(request).await,
            AiBackend::Disabled => Err(ServiceError::Unavailable("AI extraction".to_string())),
        }
    }
}

/// OCR backend selected at startup.
enum OcrBackend {
    Pure(PureOcrService),
    Missing(String),
}

impl OcrService for OcrBackend {
    async fn recognize(
        &self,
        image: &DynamicImage,
        progress: &dyn ProgressSink,
    ) -> Result<String, ServiceError> {
        match self {
            OcrBackend::Pure(engine) => engine.recognize(image, progress).await,
            OcrBackend::Missing(what) => Err(ServiceError::Unavailable(what.clone())),
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(model_dir) = &args.model_dir {
        config.ocr.model_dir = model_dir.clone();
    }
    if args.no_ai {
        config.extraction.use_ai = false;
    }

    let paths = expand_inputs(&args.inputs)?;
    let files = paths
        .iter()
        .map(|path| InputFile::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;

    let needs_ai = config.extraction.use_ai
        && files.iter().any(|f| !matches!(f.document, Document::Csv(_)));
    let needs_ocr = files
        .iter()
        .any(|f| matches!(f.document, Document::Paged(_) | Document::Image { .. }));

    let ai = if needs_ai {
        AiBackend::Gemini(GeminiClient::from_config(&config.ai)?)
    } else {
        AiBackend::Disabled
    };
    let ocr = if needs_ocr {
        load_ocr(&config)
    } else {
        OcrBackend::Missing("OCR".to_string())
    };

    let mut pipeline = Pipeline::from_config(ai, ocr, &config)?;
    if args.trace {
        pipeline = pipeline.with_tracer(Box::new(LogTracer));
    }

    info!("Processing {} files", files.len());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    let sink = |message: &str| pb.set_message(message.to_string());

    let result = pipeline.process_files(files, &sink).await;
    pb.finish_and_clear();
    let result = result?;

    let output = format_result(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

fn load_ocr(config: &TravexConfig) -> OcrBackend {
    match PureOcrService::from_config(&config.ocr) {
        Ok(engine) => OcrBackend::Pure(engine),
        Err(e) => {
            warn!("OCR disabled: {}", e);
            OcrBackend::Missing(e.to_string())
        }
    }
}

/// Resolve each argument as a path, or as a glob pattern when no such file exists.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_file() {
            paths.push(path.to_path_buf());
            continue;
        }

        let matches: Vec<PathBuf> = glob(input)
            .with_context(|| format!("Invalid input pattern: {}", input))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();

        if matches.is_empty() {
            anyhow::bail!("No files found for: {}", input);
        }
        paths.extend(matches);
    }

    Ok(paths)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    count: usize,
    total: Decimal,
    entries: Vec<TravelEntry>,
    files: &'a [FileOutcome],
}

fn format_result(result: &BatchResult, format: OutputFormat) -> anyhow::Result<String> {
    let entries = result.all_entries();

    match format {
        OutputFormat::Json => {
            let report = JsonReport {
                count: entries.len(),
                total: result.total_amount(),
                entries,
                files: &result.files,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(["date", "amount"])?;
            for entry in &entries {
                writer.write_record([entry.date.to_string(), entry.amount.to_string()])?;
            }
            let data = writer.into_inner()?;
            Ok(String::from_utf8(data)?.trim_end().to_string())
        }
        OutputFormat::Text => Ok(format_text(result, &entries)),
    }
}

fn format_text(result: &BatchResult, entries: &[TravelEntry]) -> String {
    let mut lines = Vec::new();

    for file in &result.files {
        lines.push(format!("{} ({} journeys)", file.name, file.entries.len()));
    }
    lines.push(String::new());

    for entry in entries {
        lines.push(format!("{}  £{}", entry.date, entry.amount));
    }

    lines.push(String::new());
    lines.push(format!(
        "{} journeys, total £{}",
        entries.len(),
        result.total_amount()
    ));
    lines.join("\n")
}
