//! Instructions sent with each AI extraction call.

const INSTRUCTIONS: &str = "Extract every individual journey charge from this travel statement. \
Return each journey as an object with its date in YYYY-MM-DD format and the amount charged \
in pounds as a number. Lines without a date header above them belong to the most recent date. \
Do not include daily or weekly caps, totals, refunds, top-ups or payments. \
If there are no journeys, return an empty expenses list.";

/// Prompt for one chunk of a paginated document.
pub fn chunk_prompt(index: usize, total: usize, first_page: usize, last_page: usize) -> String {
    let pages = if first_page == last_page {
        format!("page {first_page}")
    } else {
        format!("pages {first_page}-{last_page}")
    };
    format!(
        "{INSTRUCTIONS}\n\nThis is chunk {} of {} of the statement ({pages}). \
         Only report journeys that appear in this chunk.",
        index + 1,
        total
    )
}

/// Prompt for a document sent in one call.
pub fn document_prompt() -> String {
    format!("{INSTRUCTIONS}\n\nThis is the complete statement.")
}
