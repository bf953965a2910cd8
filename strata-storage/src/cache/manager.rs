//! Per-table cache routing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::traits::Cacher;

/// Resolves which cache, if any, governs a table.
///
/// Lookup order: a per-table override (which may explicitly be "none"),
/// then the default unless global caching is disabled. Owned by a session
/// factory rather than living in a process-wide static, so independent
/// engines keep independent registries.
#[derive(Default)]
pub struct CacheManager {
    default: RwLock<Option<Arc<dyn Cacher>>>,
    overrides: RwLock<HashMap<String, Option<Arc<dyn Cacher>>>>,
    disable_global: AtomicBool,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables: Vec<String> = self
            .overrides
            .read()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("CacheManager")
            .field("has_default", &self.default_cacher().is_some())
            .field("overrides", &tables)
            .field("disable_global", &self.is_global_disabled())
            .finish()
    }
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager whose default cache governs every table.
    pub fn with_default(cacher: Arc<dyn Cacher>) -> Self {
        let manager = Self::new();
        manager.set_default_cacher(Some(cacher));
        manager
    }

    pub fn get_cacher(&self, table: &str) -> Option<Arc<dyn Cacher>> {
        // A poisoned registry fails open: no caching for this call.
        if let Ok(overrides) = self.overrides.read() {
            if let Some(entry) = overrides.get(table) {
                return entry.clone();
            }
        }
        if self.is_global_disabled() {
            return None;
        }
        self.default_cacher()
    }

    pub fn default_cacher(&self) -> Option<Arc<dyn Cacher>> {
        self.default.read().ok().and_then(|d| d.clone())
    }

    pub fn set_default_cacher(&self, cacher: Option<Arc<dyn Cacher>>) {
        *self.default.write().unwrap_or_else(PoisonError::into_inner) = cacher;
    }

    /// Override routing for one table. `None` disables caching for it even
    /// when a default is set.
    pub fn set_cacher(&self, table: impl Into<String>, cacher: Option<Arc<dyn Cacher>>) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.into(), cacher);
    }

    /// Drop a table's override so it follows the default again.
    pub fn remove_cacher(&self, table: &str) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table);
    }

    /// Stop tables without an override from using the default.
    pub fn set_disable_global_cache(&self, disable: bool) {
        self.disable_global.store(disable, Ordering::Release);
        tracing::info!(disable, "Global cache switch changed");
    }

    pub fn is_global_disabled(&self) -> bool {
        self.disable_global.load(Ordering::Acquire)
    }
}
