use std::sync::Arc;
use std::time::Duration;
use tankobon_cookies::CookieRecord;
use tankobon_crawler::Crawler;
use tankobon_crawler::error::Result;
use tankobon_crawler::models::{ChapterInfo, ComicInfo, SearchResult, TagGroups};
use tokio::time::Instant;

/// A constructed crawler bound to one (site, content id), shared by every
/// caller that looked it up while it was live.
///
/// Cloning is cheap and yields the same instance.
#[derive(Clone)]
pub struct CrawlerHandle(Arc<Inner>);

struct Inner {
    site: String,
    content_id: Option<String>,
    proxy: Option<String>,
    cookies: Option<CookieRecord>,
    crawler: Box<dyn Crawler>,
    created_at: Instant,
}

impl CrawlerHandle {
    pub(crate) fn new(
        site: &str,
        content_id: Option<&str>,
        proxy: Option<String>,
        cookies: Option<CookieRecord>,
        crawler: Box<dyn Crawler>,
    ) -> Self {
        Self(Arc::new(Inner {
            site: site.to_string(),
            content_id: content_id.map(str::to_string),
            proxy,
            cookies,
            crawler,
            created_at: Instant::now(),
        }))
    }

    pub fn site(&self) -> &str {
        &self.0.site
    }

    pub fn content_id(&self) -> Option<&str> {
        self.0.content_id.as_deref()
    }

    /// Proxy the crawler was constructed with.
    pub fn proxy(&self) -> Option<&str> {
        self.0.proxy.as_deref()
    }

    /// Cookies the crawler was seeded with at construction.
    pub fn cookies(&self) -> Option<&CookieRecord> {
        self.0.cookies.as_ref()
    }

    pub fn age(&self) -> Duration {
        self.0.created_at.elapsed()
    }

    /// Whether both handles refer to the same constructed crawler.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub async fn comic(&self) -> Result<ComicInfo> {
        self.0.crawler.comic().await
    }

    pub async fn chapter(&self, number: u32) -> Result<ChapterInfo> {
        self.0.crawler.chapter(number).await
    }

    pub async fn search(&self, name: &str, page: u32) -> Result<SearchResult> {
        self.0.crawler.search(name, page).await
    }

    pub async fn tags(&self) -> Result<TagGroups> {
        self.0.crawler.tags().await
    }

    pub async fn tag_result(&self, tag: &str, page: u32) -> Result<SearchResult> {
        self.0.crawler.tag_result(tag, page).await
    }

    pub async fn latest(&self, page: u32) -> Result<SearchResult> {
        self.0.crawler.latest(page).await
    }
}

impl std::fmt::Debug for CrawlerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerHandle")
            .field("site", &self.0.site)
            .field("content_id", &self.0.content_id)
            .field("proxy", &self.0.proxy)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}
