//! Domain error types.
//!
//! These errors represent validation failures on data the client writes.
//! They are distinct from API/IO errors.

/// Domain-level errors for validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A required text field was empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A slot time could not be parsed
    #[error("invalid {field}: {value}")]
    InvalidTime { field: &'static str, value: String },

    /// Slot ends before it starts
    #[error("end time {end} is before start time {start}")]
    EndBeforeStart { start: String, end: String },

    /// Discount percentage out of range
    #[error("discount percentage must be 0-100, got {0}")]
    InvalidDiscount(u8),
}
