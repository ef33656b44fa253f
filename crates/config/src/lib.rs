//! Layered configuration for tankobon.
//!
//! Values are merged from, lowest to highest priority:
//!
//! 1. Built-in defaults ([`Config::default`]),
//! 2. an optional configuration file (TOML, YAML or JSON, picked by extension),
//! 3. environment variables prefixed with `TANKOBON_`, using `__` to descend
//!    into nested keys (e.g. `TANKOBON_CACHE__TTL_SECS=60` or
//!    `TANKOBON_PROXIES__MANHUAGUI=socks5://127.0.0.1:1080`).
//!
//! # Example
//!
//! ```toml
//! cookies_dir = "/var/lib/tankobon/cookies"
//!
//! [proxies]
//! manhuagui = "http://127.0.0.1:8080"
//!
//! [cache]
//! ttl_secs = 3600
//! capacity = 1024
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const ENV_PREFIX: &str = "TANKOBON_";
const DEFAULT_TTL_SECS: u64 = 60 * 60;
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one persisted cookie record per site.
    pub cookies_dir: PathBuf,
    /// Proxy address per site identifier. Sites without an entry connect
    /// directly.
    #[serde(default)]
    pub proxies: BTreeMap<String, String>,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Crawler handle cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a handle is reused before being rebuilt, in seconds.
    pub ttl_secs: u64,
    /// Maximum number of live handles.
    pub capacity: usize,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}
impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Zero is rejected by validation; an unvalidated zero becomes one.
    pub fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookies_dir: default_cookies_dir(),
            proxies: BTreeMap::new(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_cookies_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "tankobon")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("tankobon"))
        .join("cookies")
}

impl Config {
    /// Build the layered [`Figment`] without extracting it.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
            if !matches!(extension.as_str(), "toml" | "yaml" | "yml" | "json") {
                exn::bail!(ErrorKind::UnsupportedFormat(file.display().to_string()));
            }
            if !file.is_file() {
                exn::bail!(ErrorKind::MissingFile(file.to_path_buf()));
            }
            figment = match extension.as_str() {
                "toml" => figment.merge(Toml::file_exact(file)),
                "json" => figment.merge(Json::file_exact(file)),
                _ => figment.merge(Yaml::file_exact(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate configuration from defaults, `file` and environment.
    #[instrument]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(file)?;
        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already-built figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            cookies_dir = %config.cookies_dir.display(),
            proxies = config.proxies.len(),
            ttl_secs = config.cache.ttl_secs,
            capacity = config.cache.capacity,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cookies_dir.is_absolute() {
            exn::bail!(ErrorKind::Invalid {
                field: "cookies_dir",
                reason: format!("must be an absolute path, got {}", self.cookies_dir.display()),
            });
        }
        if self.cache.ttl_secs == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "cache.ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cache.capacity == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "cache.capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some((site, _)) = self.proxies.iter().find(|(_, proxy)| proxy.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid {
                field: "proxies",
                reason: format!("empty proxy address for site '{site}'"),
            });
        }
        Ok(())
    }

    /// Proxy configured for `site`, if any.
    pub fn proxy_for(&self, site: &str) -> Option<&str> {
        self.proxies.get(site).map(String::as_str)
    }
}
