//! Common regex patterns for transport statement extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Date headers inside free text
    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    pub static ref DATE_DAY_MONTH_YEAR: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_WEEKDAY_DAY_MONTH: Regex = Regex::new(
        r"(?i)\b(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\b\.?(?:,?\s+(\d{4})\b)?"
    ).unwrap();

    // Whole-field dates in statement columns
    pub static ref FIELD_DATE_ISO: Regex = Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})\b"
    ).unwrap();

    pub static ref FIELD_DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref FIELD_DATE_LONG: Regex = Regex::new(
        r"(?i)^(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b"
    ).unwrap();

    // Fare amount within a journey line (£2.80, 2.80)
    pub static ref JOURNEY_AMOUNT: Regex = Regex::new(
        r"£?(\d+\.\d{2})\b"
    ).unwrap();

    // Fare amount filling a whole column (-£2.80, 2.80, 3)
    pub static ref COLUMN_AMOUNT: Regex = Regex::new(
        r"^(-)?£?(\d+(?:\.\d{2})?)$"
    ).unwrap();

    // Header row keywords
    pub static ref HEADER_DATE_KEYWORD: Regex = Regex::new(
        r"date|journey|day"
    ).unwrap();

    pub static ref HEADER_AMOUNT_KEYWORD: Regex = Regex::new(
        r"amount|total|charge|cost"
    ).unwrap();
}

/// Lowercased substrings marking statement metadata rather than journeys.
pub const EXCLUDED_LINE_MARKERS: &[&str] = &[
    "cap",
    "capped",
    "daily cap",
    "weekly cap",
    "total",
    "payment",
    "auto top up",
    "refund",
    "credit",
    "adjustment",
];

/// Exclusion markers matched with spaces and hyphens removed.
pub const EXCLUDED_COMPACT_MARKERS: &[&str] = &["autotopup"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journey_amount_requires_two_decimals() {
        assert_eq!(&JOURNEY_AMOUNT.captures("Bus £2.80").unwrap()[1], "2.80");
        assert!(JOURNEY_AMOUNT.captures("Bus 2.805").is_none());
        assert!(JOURNEY_AMOUNT.captures("Route 25").is_none());
    }

    #[test]
    fn test_weekday_header_without_year() {
        let caps = DATE_WEEKDAY_DAY_MONTH.captures("Tuesday, 14 October").unwrap();
        assert_eq!(&caps[1], "14");
        assert_eq!(&caps[2], "October");
        assert!(caps.get(3).is_none());
    }

    #[test]
    fn test_column_amount() {
        assert!(COLUMN_AMOUNT.is_match("-£2.80"));
        assert!(COLUMN_AMOUNT.is_match("3"));
        assert!(!COLUMN_AMOUNT.is_match("2.8"));
        assert!(!COLUMN_AMOUNT.is_match("Bus 25"));
    }
}
