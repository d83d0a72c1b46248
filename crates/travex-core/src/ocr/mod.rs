//! OCR service backed by pure-Rust ONNX models.

mod pure_engine;
mod worker;

pub use pure_engine::PureOcrService;
