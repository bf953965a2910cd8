//! Strata Storage - Byte Stores and the Cache Engine
//!
//! Byte store backends (in-memory and LMDB), the codec, the LRU engine with
//! its background sweeper, and the per-table cache manager.

pub mod cache;

pub use cache::{
    bean_id, bean_key, decode_bean, encode_bean, ids_key, query_signature, ByteStore,
    CacheManager, CacheStats, Cacher, Codec, JsonCodec, LmdbStore, LruCacher, MemoryStore,
    SweeperHandle,
};
