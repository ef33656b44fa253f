use crate::error::{ErrorKind, Result};
use crate::models::{ChapterInfo, ComicInfo, SearchResult, TagGroups};
use async_trait::async_trait;
use tankobon_cookies::CookieRecord;

/// Everything a crawler is configured with before its first query.
///
/// Built once per handle; a crawler never sees configuration changes made
/// after it was constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlerSetup {
    /// Comic the crawler is bound to. `None` for site-level crawlers (search,
    /// tags, latest).
    pub content_id: Option<String>,
    /// Proxy address every request of this crawler should go through.
    pub proxy: Option<String>,
    /// Persisted cookies to seed the crawler's session with.
    pub cookies: Option<CookieRecord>,
}
impl CrawlerSetup {
    pub fn new(content_id: Option<impl Into<String>>) -> Self {
        Self {
            content_id: content_id.map(Into::into),
            ..Self::default()
        }
    }

    pub fn with_proxy(mut self, proxy: Option<impl Into<String>>) -> Self {
        self.proxy = proxy.map(Into::into);
        self
    }

    pub fn with_cookies(mut self, cookies: Option<CookieRecord>) -> Self {
        self.cookies = cookies;
        self
    }

    /// The bound content id, or [`MissingContentId`](ErrorKind::MissingContentId)
    /// naming the `operation` that needed it.
    pub fn require_content_id(&self, operation: &'static str) -> Result<&str> {
        match self.content_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => exn::bail!(ErrorKind::MissingContentId(operation)),
        }
    }
}

/// Queries a single site can answer.
///
/// One value is built per (site, content id) and then shared: a handle may be
/// queried by several tasks at once, so implementations must tolerate
/// concurrent calls on `&self`. Errors are the implementation's own and are
/// passed to the caller untouched.
///
/// Sites without tag browsing or a "latest" listing can leave the default
/// implementations, which fail with
/// [`UnsupportedOperation`](ErrorKind::UnsupportedOperation).
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Metadata of the bound comic.
    async fn comic(&self) -> Result<ComicInfo>;

    /// Metadata of chapter `number` of the bound comic.
    async fn chapter(&self, number: u32) -> Result<ChapterInfo>;

    /// Search the site by name. `page` is 1-based.
    async fn search(&self, name: &str, page: u32) -> Result<SearchResult>;

    async fn tags(&self) -> Result<TagGroups> {
        exn::bail!(ErrorKind::UnsupportedOperation("tags"))
    }

    /// Comics carrying the tag with identifier `tag`. `page` is 1-based.
    async fn tag_result(&self, tag: &str, page: u32) -> Result<SearchResult> {
        _ = (tag, page);
        exn::bail!(ErrorKind::UnsupportedOperation("tag_result"))
    }

    /// Most recently updated comics. `page` is 1-based.
    async fn latest(&self, page: u32) -> Result<SearchResult> {
        _ = page;
        exn::bail!(ErrorKind::UnsupportedOperation("latest"))
    }
}
