//! Heuristic journey parser driven by date-header inheritance.

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, trace};

use crate::models::{PassMethod, TravelEntry};

use super::rules::{find_header_date, find_journey_amount, is_excluded_line};
use super::StatementParser;

/// Recovers journeys from raw or OCR text without relying on layout.
///
/// Lines are scanned top to bottom. A date header sets the current date;
/// later journey lines inherit it until the next header. Amounts seen before
/// any header are dropped because there is no date to give them.
#[derive(Debug, Clone)]
pub struct HeuristicParser {
    /// Year used for `Weekday D Month` headers that omit it.
    default_year: i32,
}

impl HeuristicParser {
    /// Create a parser that fills missing years with the current year.
    pub fn new() -> Self {
        Self {
            default_year: Local::now().year(),
        }
    }

    /// Set the year assumed when a header omits it.
    pub fn with_default_year(mut self, year: i32) -> Self {
        self.default_year = year;
        self
    }

    /// Feed one line through the state machine.
    fn scan_line(
        &self,
        line: &str,
        current_date: &mut Option<NaiveDate>,
    ) -> Option<TravelEntry> {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            return None;
        }

        if let Some(date) = find_header_date(&line, self.default_year) {
            trace!("date header {} from {:?}", date, line);
            *current_date = Some(date);
            return None;
        }

        if is_excluded_line(&line) {
            trace!("skipping metadata line {:?}", line);
            return None;
        }

        let amount = find_journey_amount(&line)?;
        match current_date {
            Some(date) => TravelEntry::new(*date, amount),
            None => {
                trace!("no date context for {:?}", line);
                None
            }
        }
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for HeuristicParser {
    fn method(&self) -> PassMethod {
        PassMethod::Heuristic
    }

    fn parse(&self, text: &str) -> Vec<TravelEntry> {
        let mut current_date = None;
        let entries: Vec<TravelEntry> = text
            .lines()
            .filter_map(|line| self.scan_line(line, &mut current_date))
            .collect();

        debug!(
            "Heuristic parser found {} entries in {} characters",
            entries.len(),
            text.len()
        );
        entries
    }
}
