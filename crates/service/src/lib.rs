//! Request-facing query surface for tankobon.
//!
//! [`Service`] answers single-site queries through cached crawler handles,
//! fans a search out to many sites at once, and reads and updates the
//! per-site cookie records those handles are seeded with.
//!
//! Aggregate queries never fail as a whole. Sites the registry does not know
//! are dropped before anything runs; every other target gets a
//! [`SiteOutcome`] in the order the targets were listed, carrying either its
//! result or its own error.

mod aggregate;
pub mod error;
mod filter;
mod service;

pub use crate::aggregate::{Aggregate, SiteOutcome};
pub use crate::filter::SiteFilter;
pub use crate::service::Service;
