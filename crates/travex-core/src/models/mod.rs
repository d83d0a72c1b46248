//! Data models and configuration.

pub mod config;
pub mod entry;

pub use config::{AiConfig, ChunkConfig, ExtractionConfig, OcrConfig, TravexConfig};
pub use entry::{EntryKey, ExtractionPass, PassMethod, PassScope, TravelEntry};
