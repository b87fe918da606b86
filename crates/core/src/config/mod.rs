//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ETAGCACHE_*)
//! 2. TOML config file (if ETAGCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Cache directory used when none is configured.
pub const DEFAULT_CACHE_DIR: &str = "./etagcache";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ETAGCACHE_*)
/// 2. TOML config file (if ETAGCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the etag and body stores.
    ///
    /// Set via ETAGCACHE_CACHE_DIR environment variable.
    /// An empty path falls back to `./etagcache`.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via ETAGCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via ETAGCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects the transport follows.
    ///
    /// Set via ETAGCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Maximum response body size to read, in bytes.
    ///
    /// Set via ETAGCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Keep at most this many cached bodies, dropping the least recently
    /// written. Unbounded when unset.
    ///
    /// Set via ETAGCACHE_MAX_ENTRIES environment variable.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_user_agent() -> String {
    "etagcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_bytes: default_max_bytes(),
            max_entries: None,
        }
    }
}

/// Resolve a caller-supplied cache directory, substituting the default for an empty path.
pub fn resolve_cache_dir(dir: &Path) -> PathBuf {
    if dir.as_os_str().is_empty() { default_cache_dir() } else { dir.to_path_buf() }
}

impl AppConfig {
    /// Config with the given cache directory and defaults for everything else.
    pub fn with_cache_dir(dir: impl AsRef<Path>) -> Self {
        Self { cache_dir: resolve_cache_dir(dir.as_ref()), ..Default::default() }
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache directory with the empty-path default applied.
    pub fn cache_dir(&self) -> PathBuf {
        resolve_cache_dir(&self.cache_dir)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ETAGCACHE_`
    /// 2. TOML file from `ETAGCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ETAGCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ETAGCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate configuration from a prepared figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from("./etagcache"));
        assert_eq!(config.user_agent, "etagcache/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.max_entries.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_empty_cache_dir_uses_default() {
        assert_eq!(resolve_cache_dir(Path::new("")), PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(AppConfig::with_cache_dir("").cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));

        let config = AppConfig { cache_dir: PathBuf::new(), ..Default::default() };
        assert_eq!(config.cache_dir(), PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn test_explicit_cache_dir_kept() {
        let config = AppConfig::with_cache_dir("/tmp/orders-cache");
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/orders-cache"));
    }

    #[test]
    fn test_from_figment_toml() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(
            r#"
            cache_dir = "/var/cache/orders"
            max_entries = 100
            timeout_ms = 5000
            "#,
        ));

        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/orders"));
        assert_eq!(config.max_entries, Some(100));
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.user_agent, "etagcache/0.1");
    }

    #[test]
    fn test_from_figment_rejects_invalid() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string("max_entries = 0"));

        let result = AppConfig::from_figment(figment);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_entries"));
    }
}
