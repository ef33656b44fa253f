use crate::error::{ErrorKind, Result};
use crate::{Crawler, CrawlerSetup};

/// Builds a configured crawler for one site.
pub type Constructor = fn(CrawlerSetup) -> Result<Box<dyn Crawler>>;

/// One row of the compiled-in site table.
#[derive(Clone, Copy)]
pub struct SiteEntry {
    pub id: &'static str,
    pub construct: Constructor,
}
impl SiteEntry {
    pub const fn new(id: &'static str, construct: Constructor) -> Self {
        Self { id, construct }
    }
}
impl std::fmt::Debug for SiteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteEntry").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Static lookup from site identifier to crawler constructor.
///
/// The table is fixed at compile time by whoever links the crawler
/// implementations in; nothing can register a site at runtime. Lookups are
/// pure. If an identifier appears twice, the first row wins.
///
/// # Examples
///
/// ```
/// use tankobon_crawler::{Crawler, CrawlerSetup, Registry, SiteEntry, error::Result};
/// # use tankobon_crawler::models::*;
/// # struct Example;
/// # #[async_trait::async_trait]
/// # impl Crawler for Example {
/// #     async fn comic(&self) -> Result<ComicInfo> { unimplemented!() }
/// #     async fn chapter(&self, _: u32) -> Result<ChapterInfo> { unimplemented!() }
/// #     async fn search(&self, _: &str, page: u32) -> Result<SearchResult> { Ok(SearchResult::empty("example", page)) }
/// # }
///
/// fn example(_setup: CrawlerSetup) -> Result<Box<dyn Crawler>> {
///     Ok(Box::new(Example))
/// }
///
/// static SITES: &[SiteEntry] = &[SiteEntry::new("example", example)];
/// let registry = Registry::new(SITES);
/// assert!(registry.is_supported("example"));
/// assert!(registry.resolve("elsewhere").is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    entries: &'static [SiteEntry],
}

impl Registry {
    pub const fn new(entries: &'static [SiteEntry]) -> Self {
        Self { entries }
    }

    pub fn is_supported(&self, site: &str) -> bool {
        self.entries.iter().any(|e| e.id == site)
    }

    /// The constructor registered for `site`, or
    /// [`UnsupportedSite`](ErrorKind::UnsupportedSite).
    pub fn resolve(&self, site: &str) -> Result<Constructor> {
        match self.entries.iter().find(|e| e.id == site) {
            Some(entry) => Ok(entry.construct),
            None => {
                tracing::trace!(site, "Site not in registry");
                exn::bail!(ErrorKind::UnsupportedSite(site.to_string()))
            },
        }
    }

    /// Registered site identifiers, in table order, without duplicates.
    pub fn sites(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, e)| !self.entries[..*i].iter().any(|earlier| earlier.id == e.id))
            .map(|(_, e)| e.id)
    }

    pub fn len(&self) -> usize {
        self.sites().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
