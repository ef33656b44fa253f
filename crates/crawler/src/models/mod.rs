//! Transfer models returned by [`Crawler`](crate::Crawler) implementations.
//!
//! These are plain data: every field is filled in by the crawler that
//! produced it, and nothing here knows how to fetch anything. With the
//! `serde` feature enabled they serialize into the shape handed to the
//! request-handling layer.

mod chapter;
mod comic;
mod search;
mod tag;

pub use self::chapter::{ChapterInfo, ChapterRef};
pub use self::comic::ComicInfo;
pub use self::search::{ComicSummary, SearchResult};
pub use self::tag::{Tag, TagGroup, TagGroups};
