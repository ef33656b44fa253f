use crate::CookieRecord;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tankobon_storage::BackendHandle;
use tokio::sync::Mutex;
use tracing::instrument;

const EXTENSION: &str = "json";

/// Persists one [`CookieRecord`] per site through a storage backend.
///
/// Updates are read-modify-write. Within one process they are serialized by
/// an internal lock; across processes the caller has to keep updates for a
/// site from racing.
pub struct CookieStore {
    backend: BackendHandle,
    update_lock: Mutex<()>,
}

impl CookieStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self {
            backend,
            update_lock: Mutex::new(()),
        }
    }

    /// Relative path of the record for `site`: `<site>.json` in the backend root.
    pub fn path(site: &str) -> Result<PathBuf> {
        // A site names exactly one file in the root: never a directory, never
        // anything that resolves outside of it.
        if site.is_empty() || site == "." || site == ".." || site.contains(['/', '\\', '\0']) {
            exn::bail!(ErrorKind::InvalidSite(site.to_string()));
        }
        Ok(PathBuf::from(format!("{site}.{EXTENSION}")))
    }

    /// Read the persisted record for `site`, if there is one.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn load(&self, site: &str) -> Result<Option<CookieRecord>> {
        let path = Self::path(site)?;
        if !self.backend.exists(&path).await.or_raise(|| ErrorKind::Storage)? {
            tracing::trace!("No persisted cookies");
            return Ok(None);
        }
        let bytes = self.backend.read(&path).await.or_raise(|| ErrorKind::Storage)?;
        let record: CookieRecord =
            serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData(site.to_string()))?;
        tracing::debug!(cookies = record.len(), "Loaded persisted cookies");
        Ok(Some(record))
    }

    /// The persisted record for `site`; empty if the site has never been updated.
    pub async fn get(&self, site: &str) -> Result<CookieRecord> {
        Ok(self.load(site).await?.unwrap_or_default())
    }

    /// Merge `cookies` into the record for `site` and persist the result.
    ///
    /// With `overwrite` the existing record is discarded first, so the
    /// persisted record becomes exactly `cookies` (including when `cookies`
    /// is empty). Returns the record as persisted.
    #[instrument(skip(self, cookies), fields(backend = self.backend.name(), cookies = cookies.len()))]
    pub async fn update(&self, site: &str, cookies: CookieRecord, overwrite: bool) -> Result<CookieRecord> {
        let path = Self::path(site)?;
        let _guard = self.update_lock.lock().await;
        let mut record = match overwrite {
            true => CookieRecord::new(),
            false => self.load(site).await?.unwrap_or_default(),
        };
        record.merge(cookies);
        self.persist(&path, &record).await?;
        tracing::info!(total = record.len(), "Updated cookies");
        Ok(record)
    }

    /// Sites with a persisted record, sorted.
    pub async fn sites(&self) -> Result<Vec<String>> {
        let files = self.backend.list().await.or_raise(|| ErrorKind::Storage)?;
        let mut sites: Vec<String> = files
            .iter()
            .filter(|f| f.path.extension().and_then(|e| e.to_str()) == Some(EXTENSION))
            .filter_map(|f| f.stem().map(str::to_string))
            .collect();
        sites.sort();
        Ok(sites)
    }

    async fn persist(&self, path: &Path, record: &CookieRecord) -> Result<()> {
        // Serializing a string map cannot fail.
        let bytes = serde_json::to_vec_pretty(record).or_raise(|| ErrorKind::Storage)?;
        self.backend.write(path, &bytes).await.or_raise(|| ErrorKind::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use tankobon_storage::backend::{LocalBackend, MockBackend};

    fn record(pairs: &[(&str, &str)]) -> CookieRecord {
        pairs.iter().copied().collect()
    }

    fn store_with(backend: Arc<MockBackend>) -> CookieStore {
        CookieStore::new(backend)
    }

    #[rstest]
    #[case("manhuagui", Some("manhuagui.json"))]
    #[case("qq", Some("qq.json"))]
    #[case("", None)]
    #[case("../etc", None)]
    #[case("a/b", None)]
    #[case("..", None)]
    #[case("nul\0", None)]
    fn test_path(#[case] site: &str, #[case] expected: Option<&str>) {
        assert_eq!(CookieStore::path(site).ok(), expected.map(PathBuf::from));
    }

    #[tokio::test]
    async fn test_get_never_updated_is_empty() {
        let store = store_with(Arc::new(MockBackend::default()));
        assert_eq!(store.load("qq").await.unwrap(), None);
        assert!(store.get("qq").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_existing() {
        let backend = Arc::new(MockBackend::with_files([("qq.json", br#"{"sid":"abc"}"#)]));
        let store = store_with(backend);
        assert_eq!(store.load("qq").await.unwrap(), Some(record(&[("sid", "abc")])));
    }

    #[tokio::test]
    async fn test_load_corrupt_record() {
        let backend = Arc::new(MockBackend::with_files([("qq.json", b"not json")]));
        let store = store_with(backend);
        let err = store.load("qq").await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("qq".to_string()));
    }

    #[tokio::test]
    async fn test_update_merge_keeps_unmentioned_keys() {
        let backend = Arc::new(MockBackend::default());
        let store = store_with(backend.clone());
        store.update("qq", record(&[("sid", "1"), ("lang", "en")]), false).await.unwrap();
        let merged = store.update("qq", record(&[("sid", "2")]), false).await.unwrap();
        assert_eq!(merged, record(&[("sid", "2"), ("lang", "en")]));
        assert_eq!(store.get("qq").await.unwrap(), merged);
        // Every update is persisted immediately.
        assert_eq!(backend.writes(), 2);
    }

    #[tokio::test]
    async fn test_update_overwrite_replaces_record() {
        let store = store_with(Arc::new(MockBackend::default()));
        store.update("qq", record(&[("sid", "1"), ("lang", "en")]), false).await.unwrap();
        let replaced = store.update("qq", record(&[("token", "t")]), true).await.unwrap();
        assert_eq!(replaced, record(&[("token", "t")]));
        let persisted = store.get("qq").await.unwrap();
        assert!(!persisted.contains("lang"));
        assert!(!persisted.contains("sid"));
        assert_eq!(persisted.get("token"), Some("t"));
    }

    #[tokio::test]
    async fn test_update_overwrite_with_empty_clears() {
        let store = store_with(Arc::new(MockBackend::default()));
        store.update("qq", record(&[("sid", "1")]), false).await.unwrap();
        store.update("qq", CookieRecord::new(), true).await.unwrap();
        // Cleared, but still a persisted record rather than a missing one.
        assert_eq!(store.load("qq").await.unwrap(), Some(CookieRecord::new()));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_site() {
        let backend = Arc::new(MockBackend::default());
        let store = store_with(backend.clone());
        let err = store.update("../qq", record(&[("sid", "1")]), true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidSite(_)));
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_sites_lists_top_level_records() {
        let backend = Arc::new(MockBackend::with_files([
            ("qq.json", Vec::from(*b"{}")),
            ("manhuagui.json", Vec::from(*b"{}")),
            ("notes.txt", Vec::from(*b"")),
            ("nested/dmzj.json", Vec::from(*b"{}")),
        ]));
        let store = store_with(backend);
        assert_eq!(store.sites().await.unwrap(), vec!["manhuagui".to_string(), "qq".to_string()]);
    }

    #[tokio::test]
    async fn test_local_backend_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new("cookies", temp_dir.path()).unwrap());
        let store = CookieStore::new(backend.clone());
        store.update("qq", record(&[("sid", "1")]), false).await.unwrap();
        assert!(temp_dir.path().join("qq.json").is_file());
        // A fresh store over the same directory sees the record.
        let reopened = CookieStore::new(backend);
        assert_eq!(reopened.get("qq").await.unwrap(), record(&[("sid", "1")]));
    }
}
