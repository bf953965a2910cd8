//! LMDB-backed byte store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped store
//! that survives restarts. Cache entries found here without a recency node
//! are adopted by the LRU engine on first read.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`
//! - Write transactions for `put` and `del`

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use strata_core::StoreError;

use super::store::ByteStore;

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

/// Persistent byte store over a single unnamed LMDB database.
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&path).map_err(backend_err)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(backend_err)?;

        let mut wtxn = env.write_txn().map_err(backend_err)?;
        let db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, None).map_err(backend_err)?;
        wtxn.commit().map_err(backend_err)?;

        Ok(Self { env, db })
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend_err)?;
        self.db.len(&rtxn).map_err(backend_err)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl ByteStore for LmdbStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(backend_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(backend_err)?;
        wtxn.commit().map_err(backend_err)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend_err)?;
        match self.db.get(&rtxn, key.as_bytes()).map_err(backend_err)? {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(StoreError::NotExist {
                key: key.to_string(),
            }),
        }
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(backend_err)?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(backend_err)?;
        wtxn.commit().map_err(backend_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _temp_dir) = create_test_store();
        store.put("users-b-[1]", b"payload").expect("put should succeed");
        assert_eq!(
            store.get("users-b-[1]").expect("get should succeed"),
            b"payload"
        );
        assert_eq!(store.len().expect("len should succeed"), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _temp_dir) = create_test_store();
        let err = store.get("users-b-[404]").expect_err("key is absent");
        assert!(err.is_not_exist());
    }

    #[test]
    fn test_delete() {
        let (store, _temp_dir) = create_test_store();
        store.put("k", b"v").expect("put should succeed");
        store.del("k").expect("del should succeed");
        assert!(store.get("k").expect_err("key was deleted").is_not_exist());
        // Deleting again is fine.
        store.del("k").expect("del should succeed");
        assert!(store.is_empty().expect("is_empty should succeed"));
    }

    #[test]
    fn test_overwrite() {
        let (store, _temp_dir) = create_test_store();
        store.put("k", b"one").expect("put should succeed");
        store.put("k", b"two").expect("put should succeed");
        assert_eq!(store.get("k").expect("get should succeed"), b"two");
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbStore::open(temp_dir.path(), 10).expect("open should succeed");
            store.put("orders-b-[7]", b"kept").expect("put should succeed");
        }
        let store = LmdbStore::open(temp_dir.path(), 10).expect("reopen should succeed");
        assert_eq!(store.get("orders-b-[7]").expect("get should succeed"), b"kept");
    }
}
