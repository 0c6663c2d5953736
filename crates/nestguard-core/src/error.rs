//! Error types for core settings.

/// Errors raised when validating [`GuardSettings`](crate::GuardSettings).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    /// A numeric setting is outside its valid range.
    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    /// A required string setting is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Two settings contradict each other.
    #[error("inconsistent settings: {0}")]
    Inconsistent(String),
}

impl SettingsError {
    /// Creates a new out-of-range error.
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}
