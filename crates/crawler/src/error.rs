//! Crawler Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Crawler implementations raise these
//! (wrapping their own failures as children); nothing above them translates
//! or retries.

use derive_more::{Display, Error};

/// A crawler error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site identifier is not in the registry.
    #[display("site not supported: {_0}")]
    UnsupportedSite(#[error(not(source))] String),
    /// The site does not offer this kind of query (e.g. no tag browsing).
    #[display("operation not supported by site: {_0}")]
    UnsupportedOperation(#[error(not(source))] &'static str),
    /// The operation needs a handle bound to a content id.
    #[display("operation requires a content id: {_0}")]
    MissingContentId(#[error(not(source))] &'static str),
    /// The requested comic or chapter doesn't exist on the site.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The site could not be reached or answered with an error.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The site answered, but not in a shape the crawler understands.
    #[display("crawler error: {_0}")]
    Crawler(#[error(not(source))] String),
    /// A concurrent query task panicked or was aborted.
    #[display("query task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Task)
    }
}
