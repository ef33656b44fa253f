//! Time-bounded cache of configured crawler handles.
//!
//! A [`CrawlerHandle`] is built the first time a (site, content id) pair is
//! requested: the site's constructor from the [`Registry`](tankobon_crawler::Registry)
//! runs with the proxy configured for the site and the site's persisted
//! cookies. The same instance is then handed out until its time-to-live
//! elapses, after which the next request builds a fresh one with whatever
//! proxy and cookies are current at that point.
//!
//! # Architecture
//! - Each key maps to a slot holding a single-assignment cell. Concurrent
//!   requests for a key share the slot, so only one of them constructs the
//!   handle while the others wait for it.
//! - Slots live in an LRU map bounded by capacity. Expiry is checked against
//!   the handle's construction time on every lookup, so a handle that is hit
//!   constantly is still rebuilt once it is older than the TTL.

mod cache;
pub mod error;
mod handle;
mod proxy;

pub use crate::cache::{CacheKey, HandleCache};
pub use crate::handle::CrawlerHandle;
pub use crate::proxy::ProxySource;
