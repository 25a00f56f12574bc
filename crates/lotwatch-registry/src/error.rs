//! Error types for the registry.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Input validation failures.
///
/// Policy denials are not errors; see [`crate::Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Lot number outside `1..=MAX_LOT_NO`
    #[error("Invalid lot number: {0}")]
    InvalidLotNo(i64),

    /// Range bound below zero
    #[error("Invalid lot range: {from}..={to}")]
    InvalidRange { from: i64, to: i64 },
}
