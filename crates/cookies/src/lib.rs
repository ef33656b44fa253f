//! Per-site cookie records.
//!
//! Each supported site may have one [`CookieRecord`] persisted as
//! `<site>.json` in the root of a storage backend. Records are read when a
//! crawler handle is built and rewritten in full on every update; there is no
//! write-back buffering, so an update that returned successfully is on disk.

pub mod error;
mod record;
mod store;

pub use crate::record::CookieRecord;
pub use crate::store::CookieStore;
