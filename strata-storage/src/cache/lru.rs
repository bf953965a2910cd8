//! LRU cache engine.
//!
//! Each table owns two recency rings: one for beans, one for primary-key
//! lists. Payloads live in the byte store; the rings hold only keys and
//! last-visit times. One mutex guards every ring of an instance, and store
//! calls are made while holding it so ring and store change as one step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use strata_core::{
    is_expired, CacheConfig, CacheError, CacheResult, Clock, Pk, StoreError, StrataResult,
    SystemClock,
};

use super::codec::{Codec, JsonCodec};
use super::keys::{bean_key, ids_key};
use super::ring::Ring;
use super::store::ByteStore;
use super::traits::{CacheStats, Cacher};

// ============================================================================
// RING BOOKKEEPING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Bean,
    Query,
}

impl Tier {
    fn store_key(self, table: &str, key: &str) -> String {
        match self {
            Tier::Bean => bean_key(table, key),
            Tier::Query => ids_key(table, key),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Tier::Bean => "bean",
            Tier::Query => "query",
        }
    }
}

#[derive(Debug, Default)]
struct TableRings {
    beans: Ring,
    queries: Ring,
}

impl TableRings {
    fn ring(&self, tier: Tier) -> &Ring {
        match tier {
            Tier::Bean => &self.beans,
            Tier::Query => &self.queries,
        }
    }

    fn ring_mut(&mut self, tier: Tier) -> &mut Ring {
        match tier {
            Tier::Bean => &mut self.beans,
            Tier::Query => &mut self.queries,
        }
    }

    fn is_empty(&self) -> bool {
        self.beans.is_empty() && self.queries.is_empty()
    }
}

type Tables = HashMap<String, TableRings>;

fn ring_mut<'a>(tables: &'a mut Tables, table: &str, tier: Tier) -> &'a mut Ring {
    tables.entry(table.to_string()).or_default().ring_mut(tier)
}

#[derive(Debug, Default)]
struct LruMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl LruMetrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// LRU CACHER
// ============================================================================

/// Least-recently-used cache with time-to-live expiry, backed by a byte store.
pub struct LruCacher<C: Codec = JsonCodec> {
    store: Arc<dyn ByteStore>,
    codec: C,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    tables: Mutex<Tables>,
    metrics: LruMetrics,
}

impl LruCacher<JsonCodec> {
    /// Create a cache using the JSON codec and the system clock.
    ///
    /// `config` is taken as is. A zero capacity evicts every insertion and a
    /// zero TTL expires every entry on its next access; use
    /// [`LruCacher::try_new`] to reject such configs.
    pub fn new(store: Arc<dyn ByteStore>, config: CacheConfig) -> Self {
        Self::with_codec(store, config, JsonCodec)
    }

    /// Like [`LruCacher::new`], after checking `config` with
    /// [`CacheConfig::validate`].
    pub fn try_new(store: Arc<dyn ByteStore>, config: CacheConfig) -> StrataResult<Self> {
        config.validate()?;
        Ok(Self::new(store, config))
    }
}

impl<C: Codec> LruCacher<C> {
    pub fn with_codec(store: Arc<dyn ByteStore>, config: CacheConfig, codec: C) -> Self {
        Self {
            store,
            codec,
            config,
            clock: Arc::new(SystemClock),
            tables: Mutex::new(HashMap::new()),
            metrics: LruMetrics::default(),
        }
    }

    /// Replace the time source used for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Live bean entries for `table`.
    pub fn bean_count(&self, table: &str) -> usize {
        self.count(table, Tier::Bean)
    }

    /// Live key-list entries for `table`.
    pub fn query_count(&self, table: &str) -> usize {
        self.count(table, Tier::Query)
    }

    /// Drop expired entries from the oldest end of every ring.
    ///
    /// Each ring gives up at its first live entry or after
    /// `gc_max_removed` removals. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut tables = match self.lock() {
            Ok(tables) => tables,
            Err(e) => {
                tracing::warn!(error = %e, "Cache sweep skipped");
                return 0;
            }
        };

        let mut removed = 0usize;
        for (table, rings) in tables.iter_mut() {
            for tier in [Tier::Bean, Tier::Query] {
                let ring = rings.ring_mut(tier);
                let mut budget = self.config.gc_max_removed;
                while budget > 0 {
                    let expired = ring
                        .front()
                        .map(|n| is_expired(n.last_visit, now, self.config.ttl))
                        .unwrap_or(false);
                    if !expired {
                        break;
                    }
                    if let Some(node) = ring.pop_front() {
                        self.delete_backing(&tier.store_key(table, &node.key));
                        LruMetrics::bump(&self.metrics.expirations);
                        removed += 1;
                    }
                    budget -= 1;
                }
            }
        }
        tables.retain(|_, rings| !rings.is_empty());

        if removed > 0 {
            tracing::debug!(removed, "Cache sweep removed expired entries");
        } else {
            tracing::trace!("Cache sweep found nothing to remove");
        }
        removed
    }

    // -- Internal helpers --

    fn lock(&self) -> CacheResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn count(&self, table: &str, tier: Tier) -> usize {
        self.lock()
            .ok()
            .and_then(|tables| tables.get(table).map(|r| r.ring(tier).len()))
            .unwrap_or(0)
    }

    fn get_entry(&self, tier: Tier, table: &str, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let store_key = tier.store_key(table, key);
        let mut tables = self.lock()?;

        let last_visit = tables
            .get(table)
            .and_then(|r| r.ring(tier).get(key))
            .map(|n| n.last_visit);

        let Some(last_visit) = last_visit else {
            // Not indexed. The store may still hold it from an earlier run.
            return match self.store.get(&store_key) {
                Ok(bytes) => {
                    let ring = ring_mut(&mut tables, table, tier);
                    ring.upsert(key, now);
                    self.enforce_capacity(table, tier, ring);
                    LruMetrics::bump(&self.metrics.hits);
                    tracing::debug!(table, key, tier = tier.name(), "Cache hit, adopted from store");
                    Ok(Some(bytes))
                }
                Err(e) if e.is_not_exist() => {
                    LruMetrics::bump(&self.metrics.misses);
                    tracing::debug!(table, key, tier = tier.name(), "Cache miss");
                    Ok(None)
                }
                Err(e) => {
                    LruMetrics::bump(&self.metrics.misses);
                    Err(e.into())
                }
            };
        };

        let ring = ring_mut(&mut tables, table, tier);
        if is_expired(last_visit, now, self.config.ttl) {
            ring.remove(key);
            self.delete_backing(&store_key);
            LruMetrics::bump(&self.metrics.expirations);
            LruMetrics::bump(&self.metrics.misses);
            tracing::debug!(table, key, tier = tier.name(), "Cache entry expired");
            return Ok(None);
        }

        match self.store.get(&store_key) {
            Ok(bytes) => {
                ring.touch(key, now);
                LruMetrics::bump(&self.metrics.hits);
                tracing::debug!(table, key, tier = tier.name(), "Cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.is_not_exist() => {
                // Indexed but the payload is gone.
                ring.remove(key);
                LruMetrics::bump(&self.metrics.misses);
                tracing::debug!(table, key, tier = tier.name(), "Cache miss, dropped stale node");
                Ok(None)
            }
            Err(e) => {
                LruMetrics::bump(&self.metrics.misses);
                Err(e.into())
            }
        }
    }

    fn put_entry(&self, tier: Tier, table: &str, key: &str, bytes: &[u8]) -> CacheResult<()> {
        let now = self.clock.now();
        let store_key = tier.store_key(table, key);
        let mut tables = self.lock()?;

        self.store.put(&store_key, bytes)?;
        let ring = ring_mut(&mut tables, table, tier);
        ring.upsert(key, now);
        self.enforce_capacity(table, tier, ring);
        Ok(())
    }

    fn remove_entry(&self, tables: &mut Tables, tier: Tier, table: &str, key: &str) -> Result<(), StoreError> {
        if let Some(rings) = tables.get_mut(table) {
            rings.ring_mut(tier).remove(key);
        }
        self.store.del(&tier.store_key(table, key))
    }

    /// Remove every node of one ring and its backing entries.
    ///
    /// Keeps going past store failures and reports the first one.
    fn clear_ring(&self, tables: &mut Tables, tier: Tier, table: &str) -> Result<(), StoreError> {
        let Some(rings) = tables.get_mut(table) else {
            return Ok(());
        };
        let mut first_err = None;
        for node in rings.ring_mut(tier).drain() {
            if let Err(e) = self.store.del(&tier.store_key(table, &node.key)) {
                first_err.get_or_insert(e);
            }
        }
        if rings.is_empty() {
            tables.remove(table);
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Evict from the oldest end until the ring fits, even if that takes the
    /// entry that was just inserted.
    fn enforce_capacity(&self, table: &str, tier: Tier, ring: &mut Ring) {
        while ring.len() > self.config.max_element_size {
            let Some(node) = ring.pop_front() else { break };
            self.delete_backing(&tier.store_key(table, &node.key));
            LruMetrics::bump(&self.metrics.evictions);
            tracing::debug!(table, key = %node.key, tier = tier.name(), "Evicted least recently used entry");
        }
    }

    /// Best-effort delete of a payload whose node is already gone.
    fn delete_backing(&self, store_key: &str) {
        if let Err(e) = self.store.del(store_key) {
            tracing::warn!(key = store_key, error = %e, "Failed to delete evicted cache payload");
        }
    }
}

impl<C: Codec> Cacher for LruCacher<C> {
    fn get_ids(&self, table: &str, sql: &str) -> CacheResult<Option<Vec<Pk>>> {
        let Some(bytes) = self.get_entry(Tier::Query, table, sql)? else {
            return Ok(None);
        };
        match self.codec.decode::<Vec<Pk>>(&bytes) {
            Ok(ids) => Ok(Some(ids)),
            Err(e) => {
                // Corrupt entries are dropped so the next read repopulates.
                let mut tables = self.lock()?;
                if let Err(del_err) = self.remove_entry(&mut tables, Tier::Query, table, sql) {
                    tracing::warn!(table, error = %del_err, "Failed to drop undecodable key list");
                }
                Err(e)
            }
        }
    }

    fn put_ids(&self, table: &str, sql: &str, ids: &[Pk]) -> CacheResult<()> {
        let bytes = self.codec.encode(ids)?;
        self.put_entry(Tier::Query, table, sql, &bytes)
    }

    fn get_bean(&self, table: &str, id: &str) -> CacheResult<Option<Vec<u8>>> {
        self.get_entry(Tier::Bean, table, id)
    }

    fn put_bean(&self, table: &str, id: &str, bean: &[u8]) -> CacheResult<()> {
        self.put_entry(Tier::Bean, table, id, bean)
    }

    fn del_ids(&self, table: &str, sql: &str) -> CacheResult<()> {
        let mut tables = self.lock()?;
        self.remove_entry(&mut tables, Tier::Query, table, sql)?;
        Ok(())
    }

    fn del_bean(&self, table: &str, id: &str) -> CacheResult<()> {
        let mut tables = self.lock()?;
        let removed = self.remove_entry(&mut tables, Tier::Bean, table, id);
        // Any cached key list for the table may have included this row.
        let cleared = self.clear_ring(&mut tables, Tier::Query, table);
        removed.and(cleared)?;
        Ok(())
    }

    fn clear_ids(&self, table: &str) -> CacheResult<()> {
        let mut tables = self.lock()?;
        self.clear_ring(&mut tables, Tier::Query, table)?;
        Ok(())
    }

    fn clear_beans(&self, table: &str) -> CacheResult<()> {
        let mut tables = self.lock()?;
        self.clear_ring(&mut tables, Tier::Bean, table)?;
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let (bean_entries, query_entries) = self
            .lock()
            .map(|tables| {
                tables.values().fold((0u64, 0u64), |(b, q), r| {
                    (b + r.beans.len() as u64, q + r.queries.len() as u64)
                })
            })
            .unwrap_or((0, 0));

        CacheStats {
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            expirations: self.metrics.expirations.load(Ordering::Relaxed),
            bean_entries,
            query_entries,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
