//! Byte store contract and the in-memory backend.

use std::collections::HashMap;
use std::sync::RwLock;

use strata_core::StoreError;

/// String key to opaque bytes. No ordering or expiry of its own.
///
/// Calls are synchronous: the LRU engine makes them while holding its ring
/// lock, so implementations must return promptly or fail.
pub trait ByteStore: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Fetch a value. An absent key is [`StoreError::NotExist`].
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove a value. Removing an absent key is not an error.
    fn del(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store over a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }
}

impl ByteStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        entries.get(key).cloned().ok_or_else(|| StoreError::NotExist {
            key: key.to_string(),
        })
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_del() {
        let store = MemoryStore::new();
        store.put("users-b-[1]", b"alice").expect("put should succeed");
        assert_eq!(store.get("users-b-[1]").expect("get should succeed"), b"alice");
        assert!(store.contains("users-b-[1]"));

        store.del("users-b-[1]").expect("del should succeed");
        let err = store.get("users-b-[1]").expect_err("key was deleted");
        assert!(err.is_not_exist());
        assert!(store.is_empty());
    }

    #[test]
    fn test_del_absent_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.del("missing").is_ok());
    }

    #[test]
    fn test_overwrite() {
        let store = MemoryStore::new();
        store.put("k", b"one").expect("put should succeed");
        store.put("k", b"two").expect("put should succeed");
        assert_eq!(store.get("k").expect("get should succeed"), b"two");
        assert_eq!(store.len(), 1);
    }
}
