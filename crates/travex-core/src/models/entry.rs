//! Journey expense data model.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One journey charge: the day it was travelled and what it cost.
///
/// Entries are plain values; two identical fares on the same day are two
/// distinct entries, so collections of entries are multisets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TravelEntry {
    /// Calendar date of the journey, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Strictly positive fare.
    pub amount: Decimal,
}

impl TravelEntry {
    /// Create an entry, rejecting non-positive amounts.
    ///
    /// The amount is rounded to pence and always carries two decimals.
    pub fn new(date: NaiveDate, amount: Decimal) -> Option<Self> {
        let mut amount = amount.round_dp(2);
        amount.rescale(2);
        if amount > Decimal::ZERO {
            Some(Self { date, amount })
        } else {
            None
        }
    }

    /// Reconciliation key: date plus amount rounded to two decimals.
    pub fn key(&self) -> EntryKey {
        EntryKey {
            date: self.date,
            amount: self.amount.round_dp(2).normalize(),
        }
    }
}

impl fmt::Display for TravelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} £{:.2}", self.date.format("%Y-%m-%d"), self.amount)
    }
}

/// Identity of an entry for multiset counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// How a pass was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMethod {
    /// Schema-constrained AI extraction.
    Ai,
    /// Date-header inheritance over raw text.
    Heuristic,
    /// Tabular statement export.
    Csv,
}

/// What a pass covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassScope {
    /// One chunk of a paginated document (0-based index).
    Chunk(usize),
    /// A whole document.
    Document,
}

/// A labelled multiset of entries from one method over one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPass {
    pub method: PassMethod,
    pub scope: PassScope,
    pub entries: Vec<TravelEntry>,
}

impl ExtractionPass {
    pub fn new(method: PassMethod, scope: PassScope, entries: Vec<TravelEntry>) -> Self {
        Self {
            method,
            scope,
            entries,
        }
    }

    /// An empty pass, used when a chunk's AI output is unusable.
    pub fn empty(method: PassMethod, scope: PassScope) -> Self {
        Self::new(method, scope, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        assert!(TravelEntry::new(date("2025-10-14"), Decimal::ZERO).is_none());
        assert!(TravelEntry::new(date("2025-10-14"), Decimal::from_str("-2.80").unwrap()).is_none());
        assert!(TravelEntry::new(date("2025-10-14"), Decimal::from_str("0.001").unwrap()).is_none());
    }

    #[test]
    fn test_key_ignores_trailing_zeros() {
        let a = TravelEntry::new(date("2025-10-14"), Decimal::from_str("2.8").unwrap()).unwrap();
        let b = TravelEntry::new(date("2025-10-14"), Decimal::from_str("2.80").unwrap()).unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_serializes_iso_date() {
        let entry = TravelEntry::new(date("2025-10-14"), Decimal::from_str("2.80").unwrap()).unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"date":"2025-10-14","amount":"2.80"}"#);

        let entry = TravelEntry::new(date("2025-10-14"), Decimal::from_str("1.7").unwrap()).unwrap();
        assert_eq!(entry.amount.to_string(), "1.70");
    }
}
