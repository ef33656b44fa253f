use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Where the cache looks up the proxy for a site when it builds a handle.
///
/// Read at construction time only; a handle keeps the proxy it was built
/// with until it expires.
pub trait ProxySource: Send + Sync {
    fn proxy_for(&self, site: &str) -> Option<String>;
}

impl ProxySource for BTreeMap<String, String> {
    fn proxy_for(&self, site: &str) -> Option<String> {
        self.get(site).cloned()
    }
}

impl ProxySource for HashMap<String, String> {
    fn proxy_for(&self, site: &str) -> Option<String> {
        self.get(site).cloned()
    }
}

/// Runtime-adjustable proxies. A writer that panicked leaves the map as it
/// was, which is still a usable map.
impl<T: ProxySource> ProxySource for RwLock<T> {
    fn proxy_for(&self, site: &str) -> Option<String> {
        self.read().unwrap_or_else(PoisonError::into_inner).proxy_for(site)
    }
}
