//! Storage backend trait and implementations.
//!
//! The `StorageBackend` trait is the seam between persisted per-site state
//! (cookie records, mostly) and wherever it actually lives. The local
//! filesystem is the only production backend; an in-memory backend is
//! available behind the `mock` feature for other crates' tests.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::{backend::StorageBackend, error::Result};
///
/// async fn read_cookies(backend: &dyn StorageBackend) -> Result<Option<Vec<u8>>> {
///     let path = Path::new("manhuagui.json");
///     match backend.exists(path).await? {
///         true => Ok(Some(backend.read(path).await?)),
///         false => Ok(None),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Files directly in the storage root. Subdirectories are not entered.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream metadata of the files directly in the storage root, in no
    /// particular order.
    fn list_stream(&self) -> FileInfoStream<'_>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, replacing any existing file.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - The data must be durable once this returns; there is no separate
    ///   flush step.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}
