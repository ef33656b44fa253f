//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A handle cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for handle cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site identifier is not in the registry.
    #[display("site not supported: {_0}")]
    UnsupportedSite(#[error(not(source))] String),
    /// The persisted cookies for the site could not be loaded.
    #[display("could not load cookies for site: {_0}")]
    Cookies(#[error(not(source))] String),
    /// The site's crawler refused to build; its error is the child of this one.
    #[display("could not construct crawler for site: {_0}")]
    Construct(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Failed constructions are not cached, so the next lookup tries again.
        matches!(self, Self::Cookies(_) | Self::Construct(_))
    }
}
