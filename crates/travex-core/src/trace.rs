//! Optional span tracing for pipeline stages.
//!
//! The pipeline opens a span per file, chunk and OCR call. Backends plug in
//! through [`Tracer`]; [`NoopTracer`] is used when tracing is off.

use std::time::Instant;

use tracing::{debug, Span};

/// Opens spans for pipeline stages.
pub trait Tracer {
    /// Start a span. Metadata is a list of key/value pairs.
    fn begin(&self, name: &str, metadata: &[(&str, String)]) -> Box<dyn SpanHandle>;
}

/// An open span.
pub trait SpanHandle {
    /// Close the span.
    fn end(self: Box<Self>);
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl SpanHandle for NoopSpan {
    fn end(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn begin(&self, _name: &str, _metadata: &[(&str, String)]) -> Box<dyn SpanHandle> {
        Box::new(NoopSpan)
    }
}

/// Tracer backed by the `tracing` crate.
///
/// Each span logs its metadata when opened and its duration when closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

struct LogSpan {
    span: Span,
    name: String,
    started: Instant,
}

impl Tracer for LogTracer {
    fn begin(&self, name: &str, metadata: &[(&str, String)]) -> Box<dyn SpanHandle> {
        let fields = metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let span = tracing::debug_span!("travex", stage = %name, meta = %fields);
        span.in_scope(|| debug!("begin {}", name));

        Box::new(LogSpan {
            span,
            name: name.to_string(),
            started: Instant::now(),
        })
    }
}

impl SpanHandle for LogSpan {
    fn end(self: Box<Self>) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.span
            .in_scope(|| debug!(elapsed_ms, "end {}", self.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_open_and_close() {
        let tracers: [&dyn Tracer; 2] = [&NoopTracer, &LogTracer];
        for tracer in tracers {
            let span = tracer.begin("chunk", &[("index", "1".to_string())]);
            span.end();
        }
    }
}
