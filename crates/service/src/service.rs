use crate::aggregate::{Aggregate, fan_out};
use crate::error::{ErrorKind, Result};
use crate::filter::SiteFilter;
use exn::ResultExt;
use std::sync::Arc;
use tankobon_cache::error::ErrorKind as CacheErrorKind;
use tankobon_cache::{CrawlerHandle, HandleCache};
use tankobon_config::Config;
use tankobon_cookies::{CookieRecord, CookieStore};
use tankobon_crawler::Registry;
use tankobon_crawler::error::Result as CrawlerResult;
use tankobon_crawler::models::{ChapterInfo, ComicInfo, SearchResult, TagGroups};
use tankobon_storage::backend::LocalBackend;
use tracing::instrument;

/// The query surface handed to whatever serves requests.
///
/// Single-site calls fail with [`UnsupportedSite`](ErrorKind::UnsupportedSite)
/// for unknown sites and pass crawler failures through as
/// [`Crawler`](ErrorKind::Crawler). Cloning is cheap; clones share the cache
/// and cookie store.
#[derive(Clone)]
pub struct Service {
    cache: Arc<HandleCache>,
    cookies: Arc<CookieStore>,
}

impl Service {
    /// `cookies` should be the store `cache` loads from, so that an update is
    /// seen by the next handle constructed for the site.
    pub fn new(cache: Arc<HandleCache>, cookies: Arc<CookieStore>) -> Self {
        Self { cache, cookies }
    }

    /// Cookie records in `config.cookies_dir` on the local filesystem,
    /// proxies and cache limits from `config`.
    #[instrument(skip_all, fields(cookies_dir = %config.cookies_dir.display()))]
    pub fn from_config(registry: Registry, config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let backend = LocalBackend::new("cookies", &config.cookies_dir).or_raise(|| ErrorKind::Config)?;
        let cookies = Arc::new(CookieStore::new(Arc::new(backend)));
        let cache = HandleCache::new(
            registry,
            Arc::clone(&cookies),
            Arc::new(config.proxies.clone()),
            config.cache.ttl(),
            config.cache.capacity(),
        );
        tracing::info!(sites = registry.len(), proxies = config.proxies.len(), "Service ready");
        Ok(Self::new(Arc::new(cache), cookies))
    }

    pub fn registry(&self) -> Registry {
        self.cache.registry()
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    pub fn is_supported(&self, site: &str) -> bool {
        self.registry().is_supported(site)
    }

    pub async fn comic_info(&self, site: &str, content_id: &str) -> Result<ComicInfo> {
        let handle = handle(&self.cache, site, Some(content_id)).await?;
        passthrough(handle.comic().await)
    }

    pub async fn chapter_info(&self, site: &str, content_id: &str, number: u32) -> Result<ChapterInfo> {
        let handle = handle(&self.cache, site, Some(content_id)).await?;
        passthrough(handle.chapter(number).await)
    }

    pub async fn search(&self, site: &str, name: &str, page: u32) -> Result<SearchResult> {
        let handle = handle(&self.cache, site, None).await?;
        passthrough(handle.search(name, page).await)
    }

    pub async fn tags(&self, site: &str) -> Result<TagGroups> {
        let handle = handle(&self.cache, site, None).await?;
        passthrough(handle.tags().await)
    }

    pub async fn tag_result(&self, site: &str, tag: &str, page: u32) -> Result<SearchResult> {
        let handle = handle(&self.cache, site, None).await?;
        passthrough(handle.tag_result(tag, page).await)
    }

    pub async fn latest(&self, site: &str, page: u32) -> Result<SearchResult> {
        let handle = handle(&self.cache, site, None).await?;
        passthrough(handle.latest(page).await)
    }

    /// Search every site `filter` targets at once.
    ///
    /// Unsupported sites in `filter` are dropped silently. Sites that fail are
    /// reported in their own [`SiteOutcome`](crate::SiteOutcome) rather than
    /// failing the call; use [`Aggregate::into_results`] to treat any failure
    /// as fatal.
    #[instrument(skip(self))]
    pub async fn aggregate_search(&self, name: &str, page: u32, filter: &SiteFilter) -> Aggregate<SearchResult> {
        let targets = filter.targets(&self.registry());
        let name = name.to_string();
        fan_out(&self.cache, targets, move |handle| {
            let name = name.clone();
            async move { passthrough(handle.search(&name, page).await) }
        })
        .await
    }

    /// The persisted cookies for `site`; empty if it was never updated.
    pub async fn get_cookies(&self, site: &str) -> Result<CookieRecord> {
        self.cookies.get(site).await.or_raise(|| ErrorKind::Cookies(site.to_string()))
    }

    /// Merge `cookies` into the site's record (or replace it, with
    /// `overwrite`) and persist it. Every cached handle for the site is
    /// dropped, so the next lookup is built with the new record.
    pub async fn update_cookies(&self, site: &str, cookies: CookieRecord, overwrite: bool) -> Result<CookieRecord> {
        let record = self.cookies.update(site, cookies, overwrite).await.or_raise(|| ErrorKind::Cookies(site.to_string()))?;
        self.cache.invalidate_site(site);
        Ok(record)
    }
}

pub(crate) async fn handle(cache: &HandleCache, site: &str, content_id: Option<&str>) -> Result<CrawlerHandle> {
    match cache.get(site, content_id).await {
        Ok(handle) => Ok(handle),
        Err(err) => {
            let kind = match &*err {
                CacheErrorKind::UnsupportedSite(site) => ErrorKind::UnsupportedSite(site.clone()),
                CacheErrorKind::Cookies(site) => ErrorKind::Cookies(site.clone()),
                CacheErrorKind::Construct(site) => ErrorKind::Unavailable(site.clone()),
            };
            Err(err).or_raise(|| kind)
        },
    }
}

/// Keep the crawler's own error kind visible at this level.
fn passthrough<T>(result: CrawlerResult<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = ErrorKind::Crawler((*err).clone());
            Err(err).or_raise(|| kind)
        },
    }
}
