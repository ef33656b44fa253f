use crate::error::{Error, ErrorKind, Result};
use crate::{CrawlerHandle, ProxySource};
use exn::ResultExt;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tankobon_cookies::CookieStore;
use tankobon_crawler::{Constructor, CrawlerSetup, Registry};
use tokio::sync::OnceCell;
use tracing::instrument;

/// Identity of a cached handle. A missing content id and an empty one are the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub site: String,
    pub content_id: String,
}
impl CacheKey {
    pub fn new(site: &str, content_id: Option<&str>) -> Self {
        Self {
            site: site.to_string(),
            content_id: content_id.unwrap_or_default().to_string(),
        }
    }
}

type Slot = Arc<OnceCell<CrawlerHandle>>;

struct Slots {
    /// Constructed handles. Only these count against the capacity.
    live: LruCache<CacheKey, Slot>,
    /// Constructions in progress, at most one per key. Never evicted.
    pending: HashMap<CacheKey, Slot>,
}

enum Attempt {
    /// The slot was dropped from `pending` before this caller got to build
    /// into it; look the key up again.
    Stale,
    Failed(Error),
}

/// Hands out one shared [`CrawlerHandle`] per (site, content id) until it is
/// older than the TTL.
pub struct HandleCache {
    registry: Registry,
    cookies: Arc<CookieStore>,
    proxies: Arc<dyn ProxySource>,
    ttl: Duration,
    // Only held to pick or move a slot, never across an await.
    slots: Mutex<Slots>,
}

impl HandleCache {
    pub fn new(
        registry: Registry,
        cookies: Arc<CookieStore>,
        proxies: Arc<dyn ProxySource>,
        ttl: Duration,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            registry,
            cookies,
            proxies,
            ttl,
            slots: Mutex::new(Slots {
                live: LruCache::new(capacity),
                pending: HashMap::new(),
            }),
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The live handle for `site` and `content_id`, constructing one if there
    /// is none or the cached one has expired.
    ///
    /// Concurrent callers asking for the same key while it is being built wait
    /// for that construction instead of starting their own. A failed
    /// construction is not cached; one of the callers that were waiting on it
    /// starts the next attempt and the rest wait on that one.
    #[instrument(skip(self), fields(ttl = ?self.ttl))]
    pub async fn get(&self, site: &str, content_id: Option<&str>) -> Result<CrawlerHandle> {
        let construct = self.registry.resolve(site).or_raise(|| ErrorKind::UnsupportedSite(site.to_string()))?;
        let key = CacheKey::new(site, content_id);
        loop {
            let slot = self.slot(&key);
            let attempt = slot
                .get_or_try_init(|| async {
                    if !self.is_pending(&key, &slot) {
                        return Err(Attempt::Stale);
                    }
                    self.build(construct, site, content_id).await.map_err(Attempt::Failed)
                })
                .await;
            match attempt {
                Ok(handle) => {
                    let handle = handle.clone();
                    self.promote(&key, &slot);
                    return Ok(handle);
                },
                Err(Attempt::Stale) => tracing::trace!("Construction was abandoned, retrying"),
                Err(Attempt::Failed(err)) => {
                    self.discard(&key, &slot);
                    return Err(err);
                },
            }
        }
    }

    /// Number of cached entries, including ones still being constructed.
    pub fn len(&self) -> usize {
        let slots = self.lock();
        slots.live.len() + slots.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the cached handle for the key so the next lookup rebuilds it.
    /// Callers already holding the handle keep using it.
    pub fn invalidate(&self, site: &str, content_id: Option<&str>) -> bool {
        let key = CacheKey::new(site, content_id);
        let mut slots = self.lock();
        let removed = slots.live.pop(&key).is_some() | slots.pending.remove(&key).is_some();
        if removed {
            tracing::debug!(site, content_id, "Invalidated crawler handle");
        }
        removed
    }

    /// Drop every handle for `site`, whatever its content id. Constructions
    /// already running for the site finish for their callers but are not
    /// cached.
    pub fn invalidate_site(&self, site: &str) -> usize {
        let mut slots = self.lock();
        let keys: Vec<CacheKey> = slots.live.iter().map(|(key, _)| key).filter(|key| key.site == site).cloned().collect();
        for key in &keys {
            slots.live.pop(key);
        }
        let pending = slots.pending.len();
        slots.pending.retain(|key, _| key.site != site);
        let removed = keys.len() + pending - slots.pending.len();
        if removed > 0 {
            tracing::debug!(site, removed, "Invalidated crawler handles for site");
        }
        removed
    }

    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.live.clear();
        slots.pending.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // The maps are never left half-updated, so a poisoned lock is still usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The slot to read or build into for `key`. Expired handles are dropped
    /// from the cache, not reset, so holders of the old handle are unaffected.
    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.lock();
        let live = slots.live.get(key).filter(|slot| slot.get().is_some_and(|handle| handle.age() < self.ttl)).cloned();
        if let Some(slot) = live {
            tracing::trace!("Cache hit");
            return slot;
        }
        if slots.live.pop(key).is_some() {
            tracing::debug!("Crawler handle expired");
        }
        if let Some(slot) = slots.pending.get(key) {
            tracing::trace!("Waiting for construction in progress");
            return Arc::clone(slot);
        }
        tracing::debug!("Cache miss");
        let slot = Slot::default();
        slots.pending.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    fn is_pending(&self, key: &CacheKey, slot: &Slot) -> bool {
        self.lock().pending.get(key).is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Move a freshly built slot into the live set, evicting the least
    /// recently used handle if full.
    fn promote(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.lock();
        if !slots.pending.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            return;
        }
        slots.pending.remove(key);
        if let Some((evicted, _)) = slots.live.push(key.clone(), Arc::clone(slot))
            && evicted != *key
        {
            tracing::debug!(site = evicted.site, content_id = evicted.content_id, "Evicted crawler handle");
        }
    }

    fn discard(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.lock();
        if slots.pending.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.pending.remove(key);
        }
    }

    async fn build(&self, construct: Constructor, site: &str, content_id: Option<&str>) -> Result<CrawlerHandle> {
        let proxy = self.proxies.proxy_for(site);
        let cookies = self.cookies.load(site).await.or_raise(|| ErrorKind::Cookies(site.to_string()))?;
        let setup = CrawlerSetup::new(content_id).with_proxy(proxy.clone()).with_cookies(cookies.clone());
        let crawler = construct(setup).or_raise(|| ErrorKind::Construct(site.to_string()))?;
        tracing::info!(
            proxy = proxy.as_deref(),
            cookies = cookies.as_ref().map_or(0, |c| c.len()),
            "Constructed crawler"
        );
        Ok(CrawlerHandle::new(site, content_id, proxy, cookies, crawler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tankobon_cookies::CookieRecord;
    use tankobon_crawler::error::{ErrorKind as CrawlerErrorKind, Result as CrawlerResult};
    use tankobon_crawler::models::{ChapterInfo, ComicInfo, SearchResult};
    use tankobon_crawler::{Crawler, SiteEntry};
    use tankobon_storage::StorageBackend;
    use tankobon_storage::backend::{FileInfoStream, MockBackend};
    use tankobon_storage::error::Result as StorageResult;

    const TTL: Duration = Duration::from_secs(60);

    struct Fake {
        site: &'static str,
        setup: CrawlerSetup,
    }

    #[async_trait]
    impl Crawler for Fake {
        async fn comic(&self) -> CrawlerResult<ComicInfo> {
            let id = self.setup.require_content_id("comic")?;
            exn::bail!(CrawlerErrorKind::NotFound(id.to_string()))
        }

        async fn chapter(&self, number: u32) -> CrawlerResult<ChapterInfo> {
            exn::bail!(CrawlerErrorKind::NotFound(format!("chapter {number}")))
        }

        async fn search(&self, _name: &str, page: u32) -> CrawlerResult<SearchResult> {
            Ok(SearchResult::empty(self.site, page))
        }
    }

    static COUNTED_BUILDS: AtomicUsize = AtomicUsize::new(0);
    static FAILED_BUILDS: AtomicUsize = AtomicUsize::new(0);
    static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);

    fn alpha(setup: CrawlerSetup) -> CrawlerResult<Box<dyn Crawler>> {
        Ok(Box::new(Fake { site: "alpha", setup }))
    }

    fn counted(setup: CrawlerSetup) -> CrawlerResult<Box<dyn Crawler>> {
        COUNTED_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Fake { site: "counted", setup }))
    }

    fn failing(_: CrawlerSetup) -> CrawlerResult<Box<dyn Crawler>> {
        FAILED_BUILDS.fetch_add(1, Ordering::SeqCst);
        exn::bail!(CrawlerErrorKind::Network("connection refused".to_string()))
    }

    fn slow(setup: CrawlerSetup) -> CrawlerResult<Box<dyn Crawler>> {
        SLOW_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Fake { site: "slow", setup }))
    }

    fn slow_failing(_: CrawlerSetup) -> CrawlerResult<Box<dyn Crawler>> {
        exn::bail!(CrawlerErrorKind::Network("connection refused".to_string()))
    }

    static SITES: &[SiteEntry] = &[
        SiteEntry::new("alpha", alpha),
        SiteEntry::new("counted", counted),
        SiteEntry::new("failing", failing),
        SiteEntry::new("slow", slow),
        SiteEntry::new("slow-failing", slow_failing),
    ];

    /// Cookie storage where looking up a `slow*` site's record takes 100ms.
    /// Records how many of those lookups overlapped at most, which is how
    /// many constructions of one key ran at once.
    #[derive(Default)]
    struct SlowCookies {
        inner: MockBackend,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl StorageBackend for SlowCookies {
        fn name(&self) -> &str {
            "slow"
        }

        fn list_stream(&self) -> FileInfoStream<'_> {
            self.inner.list_stream()
        }

        async fn exists(&self, path: &Path) -> StorageResult<bool> {
            if path.to_str().is_some_and(|p| p.starts_with("slow")) {
                let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(running, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
            }
            self.inner.exists(path).await
        }

        async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
            self.inner.write(path, data).await
        }
    }

    fn cache_with(proxies: Arc<dyn ProxySource>, cookies: Arc<CookieStore>, capacity: usize) -> HandleCache {
        let capacity = NonZeroUsize::new(capacity).unwrap();
        HandleCache::new(Registry::new(SITES), cookies, proxies, TTL, capacity)
    }

    fn cache(capacity: usize) -> HandleCache {
        let cookies = Arc::new(CookieStore::new(Arc::new(MockBackend::default())));
        cache_with(Arc::new(BTreeMap::<String, String>::new()), cookies, capacity)
    }

    #[tokio::test]
    async fn test_same_instance_within_ttl() {
        let cache = cache(8);
        let first = cache.get("alpha", Some("42")).await.unwrap();
        let second = cache.get("alpha", Some("42")).await.unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(first.site(), "alpha");
        assert_eq!(first.content_id(), Some("42"));
        assert_eq!(cache.len(), 1);
    }

    #[rstest]
    #[case(Some("42"), Some("43"), false)]
    #[case(None, Some(""), true)]
    #[case(None, None, true)]
    #[tokio::test]
    async fn test_key_identity(#[case] a: Option<&str>, #[case] b: Option<&str>, #[case] shared: bool) {
        let cache = cache(8);
        let first = cache.get("alpha", a).await.unwrap();
        let second = cache.get("alpha", b).await.unwrap();
        assert_eq!(first.same_instance(&second), shared);
    }

    #[tokio::test]
    async fn test_handle_forwards_queries() {
        let cache = cache(8);
        let handle = cache.get("alpha", Some("42")).await.unwrap();
        assert_eq!(handle.search("one piece", 3).await.unwrap(), SearchResult::empty("alpha", 3));
        assert_eq!(*handle.comic().await.unwrap_err(), CrawlerErrorKind::NotFound("42".to_string()));
        assert_eq!(*handle.tags().await.unwrap_err(), CrawlerErrorKind::UnsupportedOperation("tags"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebuilt_after_ttl_with_current_configuration() {
        let proxies = Arc::new(RwLock::new(BTreeMap::from([("alpha".to_string(), "http://old:3128".to_string())])));
        let cookies = Arc::new(CookieStore::new(Arc::new(MockBackend::default())));
        let cache = cache_with(proxies.clone(), cookies.clone(), 8);

        let first = cache.get("alpha", None).await.unwrap();
        assert_eq!(first.proxy(), Some("http://old:3128"));
        assert_eq!(first.cookies(), None);

        proxies.write().unwrap().insert("alpha".to_string(), "http://new:3128".to_string());
        cookies.update("alpha", [("sid", "1")].into_iter().collect(), false).await.unwrap();

        // Still live: configuration changes are not picked up.
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let cached = cache.get("alpha", None).await.unwrap();
        assert!(cached.same_instance(&first));
        assert_eq!(cached.proxy(), Some("http://old:3128"));

        tokio::time::advance(Duration::from_secs(2)).await;
        let rebuilt = cache.get("alpha", None).await.unwrap();
        assert!(!rebuilt.same_instance(&first));
        assert_eq!(rebuilt.proxy(), Some("http://new:3128"));
        assert_eq!(rebuilt.cookies(), Some(&[("sid", "1")].into_iter().collect::<CookieRecord>()));
        assert!(rebuilt.age() < TTL);
        // The expired handle still works for whoever holds it.
        assert_eq!(first.search("x", 1).await.unwrap().page, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_requests_construct_once() {
        let cache = Arc::new(cache(8));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("counted", Some("7")).await.unwrap() })
            })
            .collect();
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.iter().all(|h| h.same_instance(&handles[0])));
        assert_eq!(COUNTED_BUILDS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = cache(2);
        let a = cache.get("alpha", Some("a")).await.unwrap();
        let b = cache.get("alpha", Some("b")).await.unwrap();
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("alpha", Some("a")).await.unwrap();
        cache.get("alpha", Some("c")).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get("alpha", Some("a")).await.unwrap().same_instance(&a));
        assert!(!cache.get("alpha", Some("b")).await.unwrap().same_instance(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_in_progress_is_never_evicted() {
        let backend = Arc::new(SlowCookies::default());
        let cookies = Arc::new(CookieStore::new(backend.clone()));
        let cache = Arc::new(cache_with(Arc::new(BTreeMap::<String, String>::new()), cookies, 1));

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get("slow", Some("1")).await.unwrap() }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Takes the only live slot while "slow" is still being built.
        cache.get("alpha", None).await.unwrap();
        let second = cache.get("slow", Some("1")).await.unwrap();
        let first = first.await.unwrap();

        assert!(first.same_instance(&second));
        assert_eq!(SLOW_BUILDS.load(Ordering::SeqCst), 1);
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_construction_is_retried_by_one_caller_at_a_time() {
        let backend = Arc::new(SlowCookies::default());
        let cookies = Arc::new(CookieStore::new(backend.clone()));
        let cache = Arc::new(cache_with(Arc::new(BTreeMap::<String, String>::new()), cookies, 8));
        let attempt = |cache: Arc<HandleCache>| tokio::spawn(async move { cache.get("slow-failing", None).await });

        let a = attempt(cache.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let b = attempt(cache.clone());
        // "a" has failed by now and "b" has taken over.
        tokio::time::sleep(Duration::from_millis(140)).await;
        let c = attempt(cache.clone());

        for task in [a, b, c] {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(*err, ErrorKind::Construct("slow-failing".to_string()));
        }
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_site_reseeds_cookies() {
        let cookies = Arc::new(CookieStore::new(Arc::new(MockBackend::default())));
        let cache = cache_with(Arc::new(BTreeMap::<String, String>::new()), cookies.clone(), 8);
        let site_level = cache.get("alpha", None).await.unwrap();
        let bound = cache.get("alpha", Some("42")).await.unwrap();
        let other = cache.get("counted", None).await.unwrap();

        let record: CookieRecord = [("sid", "login")].into_iter().collect();
        cookies.update("alpha", record.clone(), false).await.unwrap();
        assert_eq!(cache.invalidate_site("alpha"), 2);
        assert_eq!(cache.invalidate_site("alpha"), 0);

        let rebuilt = cache.get("alpha", None).await.unwrap();
        assert!(!rebuilt.same_instance(&site_level));
        assert_eq!(rebuilt.cookies(), Some(&record));
        assert!(!cache.get("alpha", Some("42")).await.unwrap().same_instance(&bound));
        assert!(cache.get("counted", None).await.unwrap().same_instance(&other));
    }

    #[tokio::test]
    async fn test_unsupported_site() {
        let cache = cache(8);
        let err = cache.get("gamma", Some("1")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedSite("gamma".to_string()));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let cache = cache(8);
        for _ in 0..2 {
            let err = cache.get("failing", None).await.unwrap_err();
            assert_eq!(*err, ErrorKind::Construct("failing".to_string()));
            assert!(err.is_retryable());
        }
        assert_eq!(FAILED_BUILDS.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cookies_fail_construction() {
        let backend = Arc::new(MockBackend::with_files([("alpha.json", b"not json")]));
        let cache = cache_with(Arc::new(BTreeMap::<String, String>::new()), Arc::new(CookieStore::new(backend)), 8);
        let err = cache.get("alpha", None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Cookies("alpha".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = cache(8);
        let first = cache.get("alpha", Some("1")).await.unwrap();
        cache.get("alpha", Some("2")).await.unwrap();
        assert!(cache.invalidate("alpha", Some("1")));
        assert!(!cache.invalidate("alpha", Some("1")));
        assert!(!cache.get("alpha", Some("1")).await.unwrap().same_instance(&first));
        cache.clear();
        assert!(cache.is_empty());
    }
}
