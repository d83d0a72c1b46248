//! Rule-based recognizers shared by the statement parsers.

pub mod amounts;
pub mod dates;
pub mod patterns;

pub use amounts::{find_journey_amount, parse_column_amount};
pub use dates::{find_header_date, month_from_name, parse_field_date};
pub use patterns::*;

/// Whether a line is statement metadata (caps, totals, top-ups, refunds).
pub fn is_excluded_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    if EXCLUDED_LINE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }

    let compact: String = lower
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    EXCLUDED_COMPACT_MARKERS
        .iter()
        .any(|marker| compact.contains(marker))
}
