//! Path validation.
//!
//! Every path handed to a backend is relative to that backend's root. Site
//! identifiers end up in file names, so anything that could climb out of the
//! root is rejected here before a backend ever touches the disk.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage path.
///
/// `.` components and repeated or trailing separators are dropped, `..` is
/// resolved as long as it never leaves the root. Empty results, null bytes
/// and platform prefixes are rejected with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::validate_path;
///
/// assert!(validate_path("cookies/manhuagui.json").is_ok());
/// assert!(validate_path("../manhuagui.json").is_err());
/// assert!(validate_path("a\0b.json").is_err());
/// assert_eq!(
///     validate_path("./cookies//../cookies/qq.json/").unwrap(),
///     Path::new("cookies/qq.json")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            // Null bytes survive Path::components() on Unix but truncate in syscalls.
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("qq.json").unwrap(), Path::new("qq.json"));
        assert_eq!(validate("cookies/qq.json").unwrap(), Path::new("cookies/qq.json"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b/./c").unwrap(), Path::new("a/b/c"));
        assert_eq!(validate("a/b/..").unwrap(), Path::new("a"));
        assert_eq!(validate("site.json///").unwrap(), Path::new("site.json"));
        // Root is the backend root, not the filesystem root.
        assert_eq!(validate("/site.json").unwrap(), Path::new("site.json"));
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid_and_empty() {
        assert!(validate("a\0b").is_err());
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
    }
}
