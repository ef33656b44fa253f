//! Cookie Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A cookie store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cookie store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site identifier can't be used as a record name.
    #[display("invalid site identifier: {_0:?}")]
    InvalidSite(#[error(not(source))] String),
    /// The persisted record for a site isn't a valid cookie record.
    #[display("corrupt cookie record for site: {_0}")]
    InvalidData(#[error(not(source))] String),
    /// The storage backend failed.
    #[display("cookie storage error")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
