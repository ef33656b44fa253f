/// A comic as it appears in a listing (search, tag or "latest" results).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComicSummary {
    pub site: String,
    pub comic_id: String,
    pub name: String,
    pub cover_image_url: Option<String>,
    pub source_url: String,
}

/// One page of listing results from a single site.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchResult {
    pub site: String,
    /// 1-based page number this result was fetched for
    pub page: u32,
    pub items: Vec<ComicSummary>,
}
impl SearchResult {
    pub fn empty(site: impl Into<String>, page: u32) -> Self {
        Self {
            site: site.into(),
            page,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
