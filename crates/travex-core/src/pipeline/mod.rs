//! Chunk/file orchestration.

pub mod batch;
pub mod chunking;
mod orchestrator;
pub mod prompt;

pub use batch::run_bounded;
pub use chunking::{pages_per_chunk, plan_chunks, DocumentChunk};
pub use orchestrator::{BatchResult, Document, FileOutcome, InputFile, Pipeline};
