//! The cache contract.

use strata_core::{CacheResult, Pk};

/// Two-tier cache keyed by table.
///
/// The query tier maps a statement signature to the primary keys it
/// matched. The bean tier maps a primary key's string form to encoded bean
/// bytes. Reads return `Ok(None)` on a miss; errors are for store, codec
/// and lock failures only.
pub trait Cacher: Send + Sync {
    fn get_ids(&self, table: &str, sql: &str) -> CacheResult<Option<Vec<Pk>>>;

    fn put_ids(&self, table: &str, sql: &str, ids: &[Pk]) -> CacheResult<()>;

    fn get_bean(&self, table: &str, id: &str) -> CacheResult<Option<Vec<u8>>>;

    fn put_bean(&self, table: &str, id: &str, bean: &[u8]) -> CacheResult<()>;

    fn del_ids(&self, table: &str, sql: &str) -> CacheResult<()>;

    /// Remove one bean. Also clears every cached key list for `table`.
    fn del_bean(&self, table: &str, id: &str) -> CacheResult<()>;

    fn clear_ids(&self, table: &str) -> CacheResult<()>;

    fn clear_beans(&self, table: &str) -> CacheResult<()>;

    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries dropped for exceeding the time-to-live.
    pub expirations: u64,
    /// Live bean entries across all tables.
    pub bean_entries: u64,
    /// Live key-list entries across all tables.
    pub query_entries: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.bean_entries + self.query_entries
    }
}
