//! Configuration types

use crate::error::{ConfigError, StrataResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ring capacity, per ring and per table.
pub const DEFAULT_MAX_ELEMENT_SIZE: usize = 1000;
/// Default time-to-live for cached entries.
pub const DEFAULT_TTL_SECS: u64 = 3600;
/// Default interval between background sweeps.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 60;
/// Default removal budget per ring per sweep tick.
pub const DEFAULT_GC_MAX_REMOVED: usize = 20;
/// Default cap on primary-key lists stored by the find path.
pub const DEFAULT_MAX_CACHED_IDS: usize = 500;

/// Configuration for an LRU cache instance and the find path that feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum live entries per ring per table.
    pub max_element_size: usize,
    /// Age past which an entry is treated as a miss.
    pub ttl: Duration,
    /// How often the background sweep runs.
    pub gc_interval: Duration,
    /// Maximum removals per ring per sweep tick.
    pub gc_max_removed: usize,
    /// Result sets with more primary keys than this are not cached, and the
    /// find path runs them directly.
    pub max_cached_ids: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            gc_interval: Duration::from_secs(DEFAULT_GC_INTERVAL_SECS),
            gc_max_removed: DEFAULT_GC_MAX_REMOVED,
            max_cached_ids: DEFAULT_MAX_CACHED_IDS,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-table ring capacity.
    pub fn with_max_elements(mut self, max: usize) -> Self {
        self.max_element_size = max;
        self
    }

    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Set the per-tick removal budget.
    pub fn with_gc_max_removed(mut self, max: usize) -> Self {
        self.gc_max_removed = max;
        self
    }

    /// Set the largest primary-key list the find path will cache.
    pub fn with_max_cached_ids(mut self, max: usize) -> Self {
        self.max_cached_ids = max;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `STRATA_CACHE_MAX_ELEMENTS`: ring capacity per table (default: 1000)
    /// - `STRATA_CACHE_TTL_SECS`: entry time-to-live (default: 3600)
    /// - `STRATA_CACHE_GC_INTERVAL_SECS`: sweep interval (default: 60)
    /// - `STRATA_CACHE_GC_MAX_REMOVED`: removals per ring per tick (default: 20)
    /// - `STRATA_CACHE_MAX_CACHED_IDS`: largest cached id list (default: 500)
    pub fn from_env() -> Self {
        Self {
            max_element_size: env_or("STRATA_CACHE_MAX_ELEMENTS", DEFAULT_MAX_ELEMENT_SIZE),
            ttl: Duration::from_secs(env_or("STRATA_CACHE_TTL_SECS", DEFAULT_TTL_SECS)),
            gc_interval: Duration::from_secs(env_or(
                "STRATA_CACHE_GC_INTERVAL_SECS",
                DEFAULT_GC_INTERVAL_SECS,
            )),
            gc_max_removed: env_or("STRATA_CACHE_GC_MAX_REMOVED", DEFAULT_GC_MAX_REMOVED),
            max_cached_ids: env_or("STRATA_CACHE_MAX_CACHED_IDS", DEFAULT_MAX_CACHED_IDS),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - max_element_size > 0
    /// - ttl and gc_interval are positive
    /// - gc_max_removed > 0
    pub fn validate(&self) -> StrataResult<()> {
        if self.max_element_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_element_size".to_string(),
                value: self.max_element_size.to_string(),
                reason: "max_element_size must be greater than 0".to_string(),
            }
            .into());
        }

        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "ttl must be positive".to_string(),
            }
            .into());
        }

        if self.gc_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "gc_interval".to_string(),
                value: format!("{:?}", self.gc_interval),
                reason: "gc_interval must be positive".to_string(),
            }
            .into());
        }

        if self.gc_max_removed == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gc_max_removed".to_string(),
                value: self.gc_max_removed.to_string(),
                reason: "gc_max_removed must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
