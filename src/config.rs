use crate::cache::DEFAULT_MAX_ENTRIES;
use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Storage
    pub database_path: String,

    // Site
    /// Overrides the home URL stored in the site settings
    pub site_url: Option<String>,
    /// Configuration blob imported on start-up
    pub settings_file: Option<String>,

    // Server
    pub port: u16,

    // Cache
    /// Lifetime of cached lookups; 0 keeps them until invalidated
    pub cache_ttl_secs: u64,
    /// Upper bound on cached entries
    pub cache_max_entries: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            // Storage
            database_path: non_empty("DATABASE_PATH").unwrap_or_else(|| "langlink.db".to_string()),

            // Site
            site_url: non_empty("SITE_URL"),
            settings_file: non_empty("SETTINGS_FILE"),

            // Server
            port: match non_empty("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT is not a valid port number: {}", port))?,
                None => 8080,
            },

            // Cache
            cache_ttl_secs: match non_empty("CACHE_TTL_SECS") {
                Some(ttl) => ttl
                    .trim()
                    .parse()
                    .with_context(|| format!("CACHE_TTL_SECS is not a number: {}", ttl))?,
                None => 300,
            },
            cache_max_entries: match non_empty("CACHE_MAX_ENTRIES") {
                Some(max) => max
                    .trim()
                    .parse()
                    .with_context(|| format!("CACHE_MAX_ENTRIES is not a number: {}", max))?,
                None => DEFAULT_MAX_ENTRIES,
            },
        })
    }
}
