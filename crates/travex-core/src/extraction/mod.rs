//! AI output validation and pass reconciliation.

pub mod reconcile;
mod validator;

pub use reconcile::{merge, merge_all};
pub use validator::{expense_schema, validate_response, Extraction, MalformedReason};
