//! The capability interface every supported site implements, the models its
//! queries return, and the compiled-in registry mapping site identifiers to
//! crawler constructors.
//!
//! Crawling itself (fetching pages, parsing, sessions) belongs to the
//! implementations; this crate only fixes the shape they plug into.

mod crawler;
pub mod error;
pub mod models;
mod registry;

pub use crate::crawler::{Crawler, CrawlerSetup};
pub use crate::registry::{Constructor, Registry, SiteEntry};
