//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! malformed event paths, invalid checksums and invalid date input.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The trailing path segments do not encode a `YY/MM/DD/HH/mm` timestamp
    #[error("Malformed event path: {0}")]
    MalformedPath(String),

    /// Invalid checksum format (expected 32 hex characters)
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// A date or date-time string could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// The lower bound of a date range is not before the upper bound
    #[error("Invalid date range: {from} is not before {to}")]
    InvalidDateRange {
        /// The lower bound
        from: String,
        /// The upper bound
        to: String,
    },
}
