use std::fmt::{Display, Formatter, Result as FmtResult};

/// A chapter as listed on a comic's index page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterRef {
    /// 1-based position in the site's chapter list
    pub number: u32,
    pub title: String,
}
impl ChapterRef {
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self { number, title: title.into() }
    }
}
impl Display for ChapterRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{} {}", self.number, self.title)
    }
}

/// Metadata for a single chapter, including the page images it is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterInfo {
    pub site: String,
    pub comic_id: String,
    pub number: u32,
    pub title: String,
    pub source_url: String,
    /// Page images, in reading order
    pub image_urls: Vec<String>,
}
impl ChapterInfo {
    pub fn pages(&self) -> usize {
        self.image_urls.len()
    }
}
