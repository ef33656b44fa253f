//! Local filesystem storage backend.
//!
//! Files are stored under a configured directory and accessed via `tokio::fs`.
//! Writes go through a sibling temporary file that is synced and renamed into
//! place, so a reader never observes a half-written record.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncWriteExt;

const TEMP_SUFFIX: &str = ".tmp";

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use tankobon_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("cookies", "/var/lib/tankobon/cookies")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Happens once at startup; not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// `None` for anything that isn't a finished record file.
    async fn root_file(entry: DirEntry) -> Result<Option<FileInfo>> {
        let name = PathBuf::from(entry.file_name());
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &name))?;
        // Leftovers of an interrupted write are not records.
        if !metadata.is_file() || name.to_str().is_none_or(|n| n.ends_with(TEMP_SUFFIX)) {
            return Ok(None);
        }
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(Some(FileInfo::new(name, metadata.len(), modified)))
    }

    /// Persist the directory entry created by a rename; without this the
    /// rename itself may not survive a crash.
    #[cfg(unix)]
    async fn sync_dir(dir: &Path, path: &Path) -> Result<()> {
        let dir = fs::File::open(dir).await.map_err(|e| Self::map_io_error(e, path))?;
        dir.sync_all().await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(())
    }

    // Directories can't be opened as files here; NTFS journals the rename.
    #[cfg(not(unix))]
    async fn sync_dir(_dir: &Path, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                Err(e) => {
                    yield Err(exn::Exn::from(Self::map_io_error(e, &self.root)));
                    return;
                },
            };
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => match Self::root_file(entry).await {
                        Ok(Some(file)) => yield Ok(file),
                        Ok(None) => {},
                        Err(e) => yield Err(e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::map_io_error(e, &self.root)));
                        break;
                    },
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        // Validated paths always have at least one component below the root.
        let parent = abs_path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut temp_path = abs_path.clone().into_os_string();
        temp_path.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_path);

        let mut file = fs::File::create(&temp_path).await.map_err(|e| Self::map_io_error(e, path))?;
        file.write_all(data).await.map_err(ErrorKind::Io)?;
        file.sync_all().await.map_err(ErrorKind::Io)?;
        drop(file);
        fs::rename(&temp_path, &abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Self::sync_dir(parent, path).await?;
        tracing::trace!(backend = %self.name, path = %path.display(), bytes = data.len(), "Wrote file");
        Ok(())
    }
}
