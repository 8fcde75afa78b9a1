// Coercion errors - raised while turning raw source text into typed fields.
// They never escape a single identifier: the pipeline turns each one into a
// rejection whose reason is this Display text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("{field} could not be read as a number: '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} could not be read as an integer: '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("{field} could not be read as a date (expected YYYY-MM-DD): '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("no {table} row found for this identifier")]
    MissingSource { table: &'static str },
}

impl CoercionError {
    /// Output column the failure refers to
    pub fn field(&self) -> &'static str {
        match self {
            CoercionError::NotANumber { field, .. }
            | CoercionError::NotAnInteger { field, .. }
            | CoercionError::InvalidDate { field, .. } => field,
            CoercionError::MissingSource { .. } => "ID",
        }
    }
}
