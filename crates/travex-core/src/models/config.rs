//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TravexError;

/// Main configuration for the travex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TravexConfig {
    /// Orchestration configuration.
    pub extraction: ExtractionConfig,

    /// Page chunking configuration.
    pub chunking: ChunkConfig,

    /// OCR fallback configuration.
    pub ocr: OcrConfig,

    /// AI extraction service configuration.
    pub ai: AiConfig,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum chunk extraction calls in flight at once.
    pub max_concurrent_chunks: usize,

    /// Maximum files processed at once.
    pub max_concurrent_files: usize,

    /// Call the AI extractor. When false only heuristic and CSV passes run.
    pub use_ai: bool,

    /// Vertical distance within which tokens share a visual line.
    pub line_tolerance: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: 3,
            max_concurrent_files: 3,
            use_ai: true,
            line_tolerance: 2.0,
        }
    }
}

/// Page grouping policy for paginated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Documents up to this many pages are sent as a single chunk.
    pub single_chunk_max_pages: usize,

    /// Upper bound (inclusive) of the medium size band.
    pub medium_max_pages: usize,

    /// Pages per chunk for medium documents.
    pub medium_pages_per_chunk: usize,

    /// Pages per chunk above the medium band.
    pub large_pages_per_chunk: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            single_chunk_max_pages: 4,
            medium_max_pages: 8,
            medium_pages_per_chunk: 2,
            large_pages_per_chunk: 4,
        }
    }
}

impl ChunkConfig {
    /// Check the policy can always make progress.
    pub fn validate(&self) -> Result<(), TravexError> {
        if self.medium_pages_per_chunk == 0 || self.large_pages_per_chunk == 0 {
            return Err(TravexError::Config(
                "pages per chunk must be at least 1".to_string(),
            ));
        }
        if self.medium_max_pages < self.single_chunk_max_pages {
            return Err(TravexError::Config(format!(
                "chunking.medium_max_pages ({}) is below single_chunk_max_pages ({})",
                self.medium_max_pages, self.single_chunk_max_pages
            )));
        }
        Ok(())
    }
}

/// OCR fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Pages whose reconstructed text is shorter than this are OCR'd.
    pub min_text_length: usize,

    /// Directory with `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`.
    pub model_dir: PathBuf,

    /// Keep `[UNK]` markers in recognized text.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            min_text_length: 100,
            model_dir: PathBuf::from("models"),
            keep_unk: false,
        }
    }
}

/// AI extraction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the generative API.
    pub endpoint: String,

    /// Model name appended to the endpoint.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "TRAVEX_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl TravexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Check the settings a pipeline depends on.
    pub fn validate(&self) -> Result<(), TravexError> {
        self.chunking.validate()?;
        if self.extraction.max_concurrent_chunks == 0 || self.extraction.max_concurrent_files == 0
        {
            return Err(TravexError::Config(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        let tolerance = self.extraction.line_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(TravexError::Config(format!(
                "extraction.line_tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        if self.extraction.use_ai && self.ai.timeout_secs == 0 {
            return Err(TravexError::Config(
                "ai.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TravexConfig =
            serde_json::from_str(r#"{"extraction": {"max_concurrent_chunks": 5}}"#).unwrap();
        assert_eq!(config.extraction.max_concurrent_chunks, 5);
        assert_eq!(config.extraction.max_concurrent_files, 3);
        assert_eq!(config.chunking, ChunkConfig::default());
        assert_eq!(config.ocr.min_text_length, 100);
    }

    #[test]
    fn test_chunk_config_validation() {
        assert!(ChunkConfig::default().validate().is_ok());

        let zero = ChunkConfig {
            large_pages_per_chunk: 0,
            ..ChunkConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(TravexConfig::default().validate().is_ok());

        let mut config = TravexConfig::default();
        config.extraction.max_concurrent_files = 0;
        assert!(matches!(config.validate(), Err(TravexError::Config(_))));

        let mut config = TravexConfig::default();
        config.extraction.line_tolerance = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = TravexConfig::default();
        config.ai.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.extraction.use_ai = false;
        assert!(config.validate().is_ok());

        let mut config = TravexConfig::default();
        config.chunking.large_pages_per_chunk = 0;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "configuration error: pages per chunk must be at least 1"
        );
    }
}
