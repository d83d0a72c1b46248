//! Statement CSV parser for tabular exports.

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, trace};

use crate::models::{PassMethod, TravelEntry};

use super::rules::{parse_column_amount, parse_field_date, HEADER_AMOUNT_KEYWORD, HEADER_DATE_KEYWORD};
use super::StatementParser;

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Parses comma, semicolon or tab separated statement exports.
///
/// The first column holds the journey date; the amount is the rightmost
/// column that looks like one. Rows missing either are skipped.
#[derive(Debug, Clone, Default)]
pub struct CsvStatementParser;

impl CsvStatementParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_row(&self, record: &StringRecord) -> Option<TravelEntry> {
        let fields: Vec<&str> = record.iter().map(clean_field).collect();
        let (first, rest) = fields.split_first()?;

        let date = parse_field_date(first)?;
        let amount = rest.iter().rev().find_map(|f| parse_column_amount(f))?;
        TravelEntry::new(date, amount)
    }
}

impl StatementParser for CsvStatementParser {
    fn method(&self) -> PassMethod {
        PassMethod::Csv
    }

    fn parse(&self, text: &str) -> Vec<TravelEntry> {
        let delimiter = sniff_delimiter(text);
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    trace!("unreadable CSV row {}: {}", row, e);
                    skipped += 1;
                    continue;
                }
            };

            if row == 0 && is_header_row(&record) {
                trace!("skipping header row");
                continue;
            }

            match self.parse_row(&record) {
                Some(entry) => entries.push(entry),
                None => skipped += 1,
            }
        }

        debug!(
            "CSV parser found {} entries ({} rows skipped, delimiter {:?})",
            entries.len(),
            skipped,
            delimiter as char
        );
        entries
    }
}

/// A header names both a date-like and an amount-like column.
fn is_header_row(record: &StringRecord) -> bool {
    let text = record.iter().collect::<Vec<_>>().join(" ").to_lowercase();
    HEADER_DATE_KEYWORD.is_match(&text) && HEADER_AMOUNT_KEYWORD.is_match(&text)
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

/// Pick the delimiter that occurs most often, outside quotes, in the first row.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    for byte in first_line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
            counts[i] += 1;
        }
    }

    CANDIDATE_DELIMITERS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| *d)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn entry(date: &str, amount: &str) -> TravelEntry {
        TravelEntry::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            Decimal::from_str(amount).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_mixed_date_formats_with_header() {
        let text = "Date,Amount\n14/10/2025,£2.80\n2025-10-15,1.70";
        assert_eq!(
            CsvStatementParser::new().parse(text),
            vec![entry("2025-10-14", "2.80"), entry("2025-10-15", "1.70")]
        );
    }

    #[test]
    fn test_quoted_commas_and_rightmost_amount() {
        let text = "Date,Journey,Charge\n\
                    \"14 Oct 2025\",\"Bus, route 25\",-£1.75\n\
                    15/10/25,\"Victoria to Oxford Circus\",\"2.80\"";
        assert_eq!(
            CsvStatementParser::new().parse(text),
            vec![entry("2025-10-14", "1.75"), entry("2025-10-15", "2.80")]
        );
    }

    #[test]
    fn test_semicolon_and_tab_separated() {
        let semi = "14/10/2025;Tube;2.80\n15/10/2025;Bus;1.75";
        assert_eq!(CsvStatementParser::new().parse(semi).len(), 2);

        let tab = "Day\tCost\n14/10/2025\t2.80";
        assert_eq!(
            CsvStatementParser::new().parse(tab),
            vec![entry("2025-10-14", "2.80")]
        );
    }

    #[test]
    fn test_no_header_keeps_first_row() {
        let text = "14/10/2025,2.80\n15/10/2025,1.70";
        assert_eq!(CsvStatementParser::new().parse(text).len(), 2);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let text = "Date,Amount\nnot a date,2.80\n14/10/2025,n/a\n14/10/2025,0.00\n\n14/10/2025,2.80,extra,1.70";
        assert_eq!(
            CsvStatementParser::new().parse(text),
            vec![entry("2025-10-14", "1.70")]
        );
    }

    #[test]
    fn test_sniff_ignores_quoted_delimiters() {
        assert_eq!(sniff_delimiter("\"a;b;c\",x,y"), b',');
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("single"), b',');
    }
}
