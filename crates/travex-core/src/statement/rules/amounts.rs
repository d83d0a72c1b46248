//! Fare amount recognition.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{COLUMN_AMOUNT, JOURNEY_AMOUNT};

/// First fare-like amount in a line (`£2.80`, `2.80`).
///
/// Only the first match counts, even when a line carries several amounts.
pub fn find_journey_amount(line: &str) -> Option<Decimal> {
    let caps = JOURNEY_AMOUNT.captures(line)?;
    Decimal::from_str(&caps[1]).ok()
}

/// Amount filling a whole statement column.
///
/// Statement exports often book charges as negative values, so the sign is
/// dropped.
pub fn parse_column_amount(field: &str) -> Option<Decimal> {
    let caps = COLUMN_AMOUNT.captures(field.trim())?;
    Decimal::from_str(&caps[2]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_first_amount_wins() {
        assert_eq!(find_journey_amount("Bus £2.80 (was £3.10)"), Some(dec("2.80")));
        assert_eq!(find_journey_amount("Bus journey"), None);
    }

    #[test]
    fn test_column_amount_drops_sign() {
        assert_eq!(parse_column_amount("-£2.80"), Some(dec("2.80")));
        assert_eq!(parse_column_amount(" 1.70 "), Some(dec("1.70")));
        assert_eq!(parse_column_amount("12"), Some(dec("12")));
        assert_eq!(parse_column_amount("Victoria"), None);
    }
}
