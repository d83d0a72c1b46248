//! Layout-independent statement parsers.

mod csv_statement;
mod heuristic;
pub mod rules;

pub use csv_statement::CsvStatementParser;
pub use heuristic::HeuristicParser;

use crate::models::{ExtractionPass, PassMethod, PassScope, TravelEntry};

/// Trait for parsers that turn statement text into entries.
///
/// Parsers never fail: malformed lines or rows are simply left out.
pub trait StatementParser {
    /// The method label of the passes this parser produces.
    fn method(&self) -> PassMethod;

    /// Parse entries from text.
    fn parse(&self, text: &str) -> Vec<TravelEntry>;

    /// Parse a whole document into a labelled pass.
    fn parse_pass(&self, text: &str) -> ExtractionPass {
        ExtractionPass::new(self.method(), PassScope::Document, self.parse(text))
    }
}
