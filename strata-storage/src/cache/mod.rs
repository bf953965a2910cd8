//! Two-tier LRU cache for the cache-aware read/write path.
//!
//! The query tier caches which primary keys a statement matched; the bean
//! tier caches encoded rows by primary key. Both tiers are per table, bounded
//! by capacity, expire by time-to-live and are swept in the background.
//!
//! # Example
//!
//! ```ignore
//! let store: Arc<dyn ByteStore> = Arc::new(MemoryStore::new());
//! let cache = Arc::new(LruCacher::new(store, CacheConfig::from_env()));
//! let _sweeper = cache.spawn_sweeper();
//!
//! let manager = CacheManager::with_default(cache);
//! ```

pub mod codec;
pub mod keys;
pub mod lmdb_backend;
pub mod lru;
pub mod manager;
pub mod ring;
pub mod store;
pub mod sweeper;
pub mod traits;

pub use codec::{decode_bean, encode_bean, Codec, JsonCodec};
pub use keys::{bean_id, bean_key, ids_key, query_signature};
pub use lmdb_backend::LmdbStore;
pub use lru::LruCacher;
pub use manager::CacheManager;
pub use store::{ByteStore, MemoryStore};
pub use sweeper::SweeperHandle;
pub use traits::{CacheStats, Cacher};
