//! Output contract of the AI extractor.
//!
//! The model is asked for `{"expenses": [{"date": "YYYY-MM-DD", "amount": 2.8}]}`
//! but nothing guarantees it complies. Every response goes through
//! [`validate_response`] so the rest of the pipeline only sees typed entries.

use std::str::FromStr;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::error::ExtractionError;
use crate::models::TravelEntry;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Outcome of checking one AI response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The response had the expected shape. Elements failing validation were
    /// dropped and counted.
    Valid {
        entries: Vec<TravelEntry>,
        dropped: usize,
    },
    /// The response could not be used at all.
    Malformed(MalformedReason),
}

/// Why a response was unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not JSON.
    InvalidJson,
    /// JSON without an `expenses` array at the top level.
    MissingExpenses,
}

impl Extraction {
    /// Entries for a chunk call, where an unusable response is an empty pass.
    pub fn into_chunk_entries(self) -> Vec<TravelEntry> {
        match self {
            Extraction::Valid { entries, .. } => entries,
            Extraction::Malformed(_) => Vec::new(),
        }
    }

    /// Entries for a single-document call, where unusable output is an error.
    ///
    /// An empty `expenses` array is a legitimate "nothing found"; a non-empty
    /// array whose elements all failed validation is not.
    pub fn into_document_entries(self) -> Result<Vec<TravelEntry>, ExtractionError> {
        match self {
            Extraction::Malformed(MalformedReason::InvalidJson) => {
                Err(ExtractionError::UnexpectedFormat)
            }
            Extraction::Malformed(MalformedReason::MissingExpenses) => {
                Err(ExtractionError::NoExpenseData)
            }
            Extraction::Valid { entries, dropped } if entries.is_empty() && dropped > 0 => {
                Err(ExtractionError::NoValidEntries { found: dropped })
            }
            Extraction::Valid { entries, .. } => Ok(entries),
        }
    }
}

/// Check a raw model response against the expense contract.
pub fn validate_response(raw: &str) -> Extraction {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            debug!("AI response is not JSON: {}", e);
            return Extraction::Malformed(MalformedReason::InvalidJson);
        }
    };

    let Some(items) = value.get("expenses").and_then(Value::as_array) else {
        debug!("AI response has no expenses array");
        return Extraction::Malformed(MalformedReason::MissingExpenses);
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in items {
        match validate_item(item) {
            Some(entry) => entries.push(entry),
            None => {
                trace!("dropping invalid expense element {}", item);
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        debug!("Validated {} expenses, dropped {}", entries.len(), dropped);
    }
    Extraction::Valid { entries, dropped }
}

fn validate_item(item: &Value) -> Option<TravelEntry> {
    let date = item.get("date")?.as_str()?;
    if !ISO_DATE.is_match(date) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    let amount = match item.get("amount")? {
        Value::Number(n) => number_to_decimal(n)?,
        _ => return None,
    };
    TravelEntry::new(date, amount)
}

fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    let repr = n.to_string();
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .ok()
}

/// JSON schema the AI extractor must follow.
pub fn expense_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "expenses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "Journey date in YYYY-MM-DD format"
                        },
                        "amount": {
                            "type": "number",
                            "description": "Fare charged for the journey in pounds"
                        }
                    },
                    "required": ["date", "amount"]
                }
            }
        },
        "required": ["expenses"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(date: &str, amount: &str) -> TravelEntry {
        TravelEntry::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            Decimal::from_str(amount).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_response() {
        let raw = r#"{"expenses":[{"date":"2025-10-14","amount":2.8},{"date":"2025-10-14","amount":1.7}]}"#;
        assert_eq!(
            validate_response(raw),
            Extraction::Valid {
                entries: vec![entry("2025-10-14", "2.80"), entry("2025-10-14", "1.70")],
                dropped: 0,
            }
        );
    }

    #[test]
    fn test_rejects_bad_date_and_non_numeric_amount() {
        let raw = r#"{"expenses":[{"date":"14-10-2025","amount":2.8},{"date":"2025-10-15","amount":"x"}]}"#;
        let extraction = validate_response(raw);
        assert_eq!(
            extraction,
            Extraction::Valid {
                entries: vec![],
                dropped: 2,
            }
        );
        assert_eq!(extraction.clone().into_chunk_entries(), vec![]);
        assert_eq!(
            extraction.into_document_entries(),
            Err(ExtractionError::NoValidEntries { found: 2 })
        );
    }

    #[test]
    fn test_drops_impossible_and_non_positive_values() {
        let raw = r#"{"expenses":[
            {"date":"2025-02-30","amount":2.8},
            {"date":"2025-10-15","amount":-1.5},
            {"date":"2025-10-15"},
            {"amount":1.5},
            {"date":"2025-10-15","amount":1.5e0}
        ]}"#;
        assert_eq!(
            validate_response(raw),
            Extraction::Valid {
                entries: vec![entry("2025-10-15", "1.50")],
                dropped: 4,
            }
        );
    }

    #[test]
    fn test_malformed_chunk_degrades_to_empty() {
        assert!(validate_response("Sorry, I can't help").into_chunk_entries().is_empty());
        assert!(validate_response(r#"{"items":[]}"#).into_chunk_entries().is_empty());
    }

    #[test]
    fn test_document_errors() {
        assert_eq!(
            validate_response("not json").into_document_entries(),
            Err(ExtractionError::UnexpectedFormat)
        );
        assert_eq!(
            validate_response(r#"{"expenses": "none"}"#).into_document_entries(),
            Err(ExtractionError::NoExpenseData)
        );
        assert_eq!(
            validate_response(r#"{"expenses": []}"#).into_document_entries(),
            Ok(vec![])
        );
    }

    #[test]
    fn test_schema_requires_expenses() {
        let schema = expense_schema();
        assert_eq!(schema["required"], json!(["expenses"]));
        assert_eq!(
            schema["properties"]["expenses"]["items"]["required"],
            json!(["date", "amount"])
        );
    }
}
