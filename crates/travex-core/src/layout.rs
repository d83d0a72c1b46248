//! Reading-order reconstruction from positioned text tokens.
//!
//! Statement PDFs place the date of a group of journeys in a visually
//! separate row. Plain text extraction loses that row structure, so pages are
//! rebuilt line by line from token coordinates before any parsing happens.

use serde::{Deserialize, Serialize};

/// Default vertical tolerance for tokens sharing a visual line.
pub const DEFAULT_LINE_TOLERANCE: f32 = 2.0;

/// A run of text at a position on the page.
///
/// Coordinates use the PDF convention: the origin is at the bottom left, so a
/// larger `y` is higher on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

impl PositionedToken {
    pub fn new(x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            text: text.into(),
        }
    }
}

/// The ordered lines of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub lines: Vec<String>,
}

impl PageText {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Build a page from free text (OCR output), one entry per non-empty line.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(normalize_whitespace)
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// The page as newline-separated text.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Number of characters across all lines, separators included.
    pub fn char_len(&self) -> usize {
        let content: usize = self.lines.iter().map(|l| l.chars().count()).sum();
        content + self.lines.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Group tokens into visual lines and return them top to bottom.
///
/// A token joins the current line when its `y` is within `tolerance` of the
/// line's first token. Tokens inside a line are ordered by `x`.
pub fn reconstruct_lines(tokens: &[PositionedToken], tolerance: f32) -> PageText {
    let mut sorted: Vec<&PositionedToken> = tokens
        .iter()
        .filter(|t| t.x.is_finite() && t.y.is_finite())
        .collect();
    // Top of the page first.
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut rows: Vec<(f32, Vec<&PositionedToken>)> = Vec::new();
    for token in sorted {
        let same_row = rows
            .last()
            .is_some_and(|(anchor_y, _)| (anchor_y - token.y).abs() <= tolerance);
        if same_row {
            if let Some((_, row)) = rows.last_mut() {
                row.push(token);
                continue;
            }
        }
        rows.push((token.y, vec![token]));
    }

    let lines = rows
        .into_iter()
        .map(|(_, mut row)| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            let joined = row
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            normalize_whitespace(&joined)
        })
        .filter(|line| !line.is_empty())
        .collect();

    PageText { lines }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tok(x: f32, y: f32, text: &str) -> PositionedToken {
        PositionedToken::new(x, y, text)
    }

    #[test]
    fn test_groups_rows_with_baseline_jitter() {
        let tokens = vec![
            tok(300.0, 699.8, "£2.80"),
            tok(50.0, 700.0, "Bus"),
            tok(120.0, 701.5, "route  25"),
            tok(50.0, 720.0, "Tuesday 14 October 2025"),
        ];
        let page = reconstruct_lines(&tokens, DEFAULT_LINE_TOLERANCE);
        assert_eq!(
            page.lines,
            vec![
                "Tuesday 14 October 2025".to_string(),
                "Bus route 25 £2.80".to_string(),
            ]
        );
    }

    #[test]
    fn test_separate_rows_outside_tolerance() {
        let tokens = vec![tok(0.0, 100.0, "a"), tok(0.0, 97.0, "b")];
        let page = reconstruct_lines(&tokens, DEFAULT_LINE_TOLERANCE);
        assert_eq!(page.lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let joined = reconstruct_lines(
            &[tok(0.0, 100.0, "a"), tok(10.0, 98.0, "b")],
            DEFAULT_LINE_TOLERANCE,
        );
        assert_eq!(joined.lines, vec!["a b".to_string()]);

        let split = reconstruct_lines(
            &[tok(0.0, 100.0, "a"), tok(10.0, 97.99, "b")],
            DEFAULT_LINE_TOLERANCE,
        );
        assert_eq!(split.lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_drifting_rows_measure_from_row_anchor() {
        // Each step is within tolerance of the previous token, but the third
        // is 3.0 below the first row's anchor and starts a new row.
        let tokens = vec![
            tok(0.0, 100.0, "a"),
            tok(10.0, 98.5, "b"),
            tok(0.0, 97.0, "c"),
            tok(10.0, 95.5, "d"),
        ];
        let page = reconstruct_lines(&tokens, DEFAULT_LINE_TOLERANCE);
        assert_eq!(page.lines, vec!["a b".to_string(), "c d".to_string()]);
    }

    #[test]
    fn test_zero_tolerance_needs_equal_baselines() {
        let tokens = vec![tok(10.0, 50.0, "b"), tok(0.0, 50.0, "a"), tok(0.0, 49.9, "c")];
        let page = reconstruct_lines(&tokens, 0.0);
        assert_eq!(page.lines, vec!["a b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_drops_blank_tokens_and_empty_pages() {
        let tokens = vec![tok(0.0, 50.0, "   "), tok(10.0, 10.0, "x")];
        let page = reconstruct_lines(&tokens, DEFAULT_LINE_TOLERANCE);
        assert_eq!(page.lines, vec!["x".to_string()]);

        assert!(reconstruct_lines(&[], DEFAULT_LINE_TOLERANCE).is_empty());
    }

    #[test]
    fn test_page_char_len() {
        let page = PageText::new(vec!["ab".into(), "cde".into()]);
        assert_eq!(page.char_len(), 6);
        assert_eq!(page.text(), "ab\ncde");
    }
}
