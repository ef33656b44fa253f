//! Service Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Crawler failures keep their own kind
//! (see [`ErrorKind::Crawler`]) so callers can still tell a missing comic from
//! a network outage.

use derive_more::{Display, Error};
use tankobon_crawler::error::ErrorKind as CrawlerErrorKind;

/// A service error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site identifier is not in the registry.
    #[display("site not supported: {_0}")]
    UnsupportedSite(#[error(not(source))] String),
    /// The crawler answered the query with an error of its own.
    #[display("{_0}")]
    Crawler(#[error(not(source))] CrawlerErrorKind),
    /// No crawler could be built for the site.
    #[display("crawler unavailable for site: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The site's cookie record could not be read or written.
    #[display("cookie store failure for site: {_0}")]
    Cookies(#[error(not(source))] String),
    /// The service could not be assembled from its configuration.
    #[display("invalid service configuration")]
    Config,
    /// A concurrent query task panicked or was aborted.
    #[display("query task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Crawler(kind) => kind.is_retryable(),
            Self::Unavailable(_) | Self::Task => true,
            Self::UnsupportedSite(_) | Self::Cookies(_) | Self::Config => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::UnsupportedSite("nope".to_string()), "site not supported: nope", false)]
    #[case(ErrorKind::Crawler(CrawlerErrorKind::NotFound("comic 1".to_string())), "not found: comic 1", false)]
    #[case(ErrorKind::Crawler(CrawlerErrorKind::Network("timed out".to_string())), "network error: timed out", true)]
    #[case(ErrorKind::Unavailable("qq".to_string()), "crawler unavailable for site: qq", true)]
    #[case(ErrorKind::Task, "query task failed", true)]
    fn test_display_and_retryable(#[case] kind: ErrorKind, #[case] display: &str, #[case] retryable: bool) {
        assert_eq!(kind.to_string(), display);
        assert_eq!(kind.is_retryable(), retryable);
    }
}
