use super::ChapterRef;

/// Metadata for a single comic on a site.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComicInfo {
    pub site: String,
    /// Site-specific identifier of the comic
    pub comic_id: String,
    pub name: String,
    /// Free-text description (may be empty)
    pub description: String,
    /// Authors as the site lists them (may be empty)
    pub authors: Vec<String>,
    /// Tag names as the site lists them
    pub tags: Vec<String>,
    /// Serialization status text, e.g. "ongoing" (site-specific wording)
    pub status: Option<String>,
    pub cover_image_url: Option<String>,
    pub source_url: String,
    /// Last update as reported by the site (site-specific format)
    pub last_updated: Option<String>,
    /// Chapter list, in the site's order
    pub chapters: Vec<ChapterRef>,
}
impl ComicInfo {
    /// The chapter with the highest number, if any have been published.
    pub fn latest_chapter(&self) -> Option<&ChapterRef> {
        self.chapters.iter().max_by_key(|c| c.number)
    }

    pub fn chapter(&self, number: u32) -> Option<&ChapterRef> {
        self.chapters.iter().find(|c| c.number == number)
    }
}
