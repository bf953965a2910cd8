//! Session handle and the cache-aware read path.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use strata_core::{
    CacheConfig, Dialect, Entity, Executor, Pk, SqlValue, StrataError, StrataResult, TableMeta,
};
use strata_sql::{analyze, rewrite_find};
use strata_storage::{
    bean_id, decode_bean, encode_bean, query_signature, CacheManager, Cacher, Codec, JsonCodec,
};

use crate::batch::bean_select;

/// Runs statements for one caller, consulting the per-table cache.
#[derive(Clone)]
pub struct Session<C: Codec = JsonCodec> {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) manager: Arc<CacheManager>,
    pub(crate) codec: C,
    max_cached_ids: usize,
    use_cache: bool,
}

impl<C: Codec> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect.name())
            .field("manager", &self.manager)
            .field("max_cached_ids", &self.max_cached_ids)
            .field("use_cache", &self.use_cache)
            .finish()
    }
}

impl Session<JsonCodec> {
    pub fn new(
        executor: Arc<dyn Executor>,
        dialect: Arc<dyn Dialect>,
        manager: Arc<CacheManager>,
    ) -> Self {
        Self {
            executor,
            dialect,
            manager,
            codec: JsonCodec,
            max_cached_ids: CacheConfig::default().max_cached_ids,
            use_cache: true,
        }
    }
}

impl<C: Codec> Session<C> {
    /// Encode cached beans with `codec` instead.
    pub fn with_codec<D: Codec>(self, codec: D) -> Session<D> {
        Session {
            executor: self.executor,
            dialect: self.dialect,
            manager: self.manager,
            codec,
            max_cached_ids: self.max_cached_ids,
            use_cache: self.use_cache,
        }
    }

    /// Take the key-list size limit from `config`.
    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.max_cached_ids = config.max_cached_ids;
        self
    }

    pub fn with_max_cached_ids(mut self, max: usize) -> Self {
        self.max_cached_ids = max;
        self
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.use_cache
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Cache used for reads on `table`, if any.
    pub(crate) fn read_cacher(&self, table: &str) -> Option<Arc<dyn Cacher>> {
        if !self.use_cache {
            return None;
        }
        self.manager.get_cacher(table)
    }

    // ------------------------------------------------------------------------
    // Find / Get
    // ------------------------------------------------------------------------

    /// Run a select returning every matching `T`.
    ///
    /// Grouped, aggregated or distinct selects, tables without a cache, and
    /// statements the rewriter cannot project onto the primary key run
    /// directly. So do results with more keys than `max_cached_ids`, which
    /// keeps the bean lookup within driver parameter limits.
    pub async fn find<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Vec<T>> {
        let meta = T::table_meta();
        let Some((cacher, pk_sql)) = self.plan_read(&meta, sql) else {
            return self.find_direct(sql, args).await;
        };
        let Some(ids) = self.resolve_ids(cacher.as_ref(), &meta, &pk_sql, args).await else {
            return self.find_direct(sql, args).await;
        };
        if ids.len() > self.max_cached_ids {
            tracing::debug!(
                table = %meta.name,
                count = ids.len(),
                limit = self.max_cached_ids,
                "Too many keys for one bean lookup, running directly"
            );
            return self.find_direct(sql, args).await;
        }

        let mut slots: Vec<Option<T>> = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        for pk in &ids {
            let bean = self.cached_bean::<T>(cacher.as_ref(), &meta.name, pk);
            if bean.is_none() && seen.insert(pk) {
                missing.push(pk.clone());
            }
            slots.push(bean);
        }

        if !missing.is_empty() {
            let Some(fetched) = self.fetch_beans::<T>(cacher.as_ref(), &meta, &missing).await else {
                return self.find_direct(sql, args).await;
            };
            for (slot, pk) in slots.iter_mut().zip(&ids) {
                if slot.is_some() {
                    continue;
                }
                *slot = fetched.get(pk).cloned();
                if slot.is_none() {
                    tracing::debug!(table = %meta.name, pk = %pk, "Row vanished since key select, skipping");
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Run a select returning the first matching `T`.
    pub async fn get<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Option<T>> {
        let meta = T::table_meta();
        let Some((cacher, pk_sql)) = self.plan_read(&meta, sql) else {
            return self.get_direct(sql, args).await;
        };
        let Some(ids) = self.resolve_ids(cacher.as_ref(), &meta, &pk_sql, args).await else {
            return self.get_direct(sql, args).await;
        };
        let Some(pk) = ids.first() else {
            return Ok(None);
        };

        if let Some(bean) = self.cached_bean::<T>(cacher.as_ref(), &meta.name, pk) {
            return Ok(Some(bean));
        }
        match self
            .fetch_beans::<T>(cacher.as_ref(), &meta, std::slice::from_ref(pk))
            .await
        {
            Some(mut fetched) => match fetched.remove(pk) {
                Some(bean) => Ok(Some(bean)),
                None => self.get_direct(sql, args).await,
            },
            None => self.get_direct(sql, args).await,
        }
    }

    async fn find_direct<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Vec<T>> {
        let rows = self.executor.query(sql, args).await?;
        rows.iter()
            .map(|row| T::from_row(row).map_err(StrataError::from))
            .collect()
    }

    async fn get_direct<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Option<T>> {
        let rows = self.executor.query(sql, args).await?;
        match rows.first() {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Pick the cache and the key-only rewrite for a read, or `None` to run it directly.
    fn plan_read(&self, meta: &TableMeta, sql: &str) -> Option<(Arc<dyn Cacher>, String)> {
        let cacher = self.read_cacher(&meta.name)?;

        let shape = analyze(sql);
        if !shape.is_cacheable() {
            tracing::debug!(table = %meta.name, ?shape, "Query shape not cacheable, running directly");
            return None;
        }

        match rewrite_find(sql, &self.quoted_pk(meta)) {
            Ok(pk_sql) => Some((cacher, pk_sql)),
            Err(e) => {
                tracing::debug!(table = %meta.name, error = %e, "Running directly");
                None
            }
        }
    }

    /// Key columns rendered for the key-only projection.
    pub(crate) fn quoted_pk(&self, meta: &TableMeta) -> Vec<String> {
        meta.pk_columns
            .iter()
            .map(|c| self.dialect.quote(c))
            .collect()
    }

    /// Primary keys matching `pk_sql`, from the key-list cache or the executor.
    ///
    /// `None` means the key select itself failed and the caller should run
    /// the original statement instead.
    async fn resolve_ids(
        &self,
        cacher: &dyn Cacher,
        meta: &TableMeta,
        pk_sql: &str,
        args: &[SqlValue],
    ) -> Option<Vec<Pk>> {
        let signature = query_signature(pk_sql, args);
        match cacher.get_ids(&meta.name, &signature) {
            Ok(Some(ids)) => {
                tracing::debug!(table = %meta.name, count = ids.len(), "Key list cache hit");
                return Some(ids);
            }
            Ok(None) => tracing::debug!(table = %meta.name, "Key list cache miss"),
            Err(e) => {
                tracing::warn!(table = %meta.name, error = %e, "Key list lookup failed, treating as miss")
            }
        }

        let ids = self.select_keys(meta, pk_sql, args).await?;
        if ids.len() > self.max_cached_ids {
            tracing::warn!(
                table = %meta.name,
                count = ids.len(),
                limit = self.max_cached_ids,
                "Key list too large to cache"
            );
        } else if let Err(e) = cacher.put_ids(&meta.name, &signature, &ids) {
            tracing::warn!(table = %meta.name, error = %e, "Failed to cache key list");
        }
        Some(ids)
    }

    /// Run a key-only select through the executor, bypassing the cache.
    pub(crate) async fn select_keys(
        &self,
        meta: &TableMeta,
        pk_sql: &str,
        args: &[SqlValue],
    ) -> Option<Vec<Pk>> {
        let rows = match self.executor.query(pk_sql, args).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(table = %meta.name, error = %e, "Key select failed");
                return None;
            }
        };
        match rows
            .iter()
            .map(|row| Pk::from_row(row, &meta.pk_columns))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(ids) => Some(ids),
            Err(e) => {
                tracing::warn!(table = %meta.name, error = %e, "Key select returned unusable rows");
                None
            }
        }
    }

    fn cached_bean<T: Entity>(&self, cacher: &dyn Cacher, table: &str, pk: &Pk) -> Option<T> {
        let bytes = match cacher.get_bean(table, &bean_id(pk)) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(table, pk = %pk, error = %e, "Bean lookup failed, treating as miss");
                return None;
            }
        };
        match decode_bean::<C, T>(&self.codec, pk, &bytes) {
            Ok(bean) => Some(bean),
            Err(e) => {
                tracing::warn!(table, pk = %pk, error = %e, "Cached bean rejected, refetching");
                None
            }
        }
    }

    /// Fetch `pks` in one statement and cache every row found.
    ///
    /// The lookup goes straight to the executor. `None` means it failed.
    async fn fetch_beans<T: Entity>(
        &self,
        cacher: &dyn Cacher,
        meta: &TableMeta,
        pks: &[Pk],
    ) -> Option<HashMap<Pk, T>> {
        let (sql, args) = bean_select(self.dialect.as_ref(), meta, pks);
        let rows = match self.executor.query(&sql, &args).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(table = %meta.name, error = %e, "Bean lookup query failed");
                return None;
            }
        };

        let mut fetched = HashMap::with_capacity(rows.len());
        for row in &rows {
            let bean = match T::from_row(row) {
                Ok(bean) => bean,
                Err(e) => {
                    tracing::warn!(table = %meta.name, error = %e, "Bean lookup returned unusable row");
                    return None;
                }
            };
            self.store_bean(cacher, &meta.name, &bean);
            fetched.insert(bean.primary_key(), bean);
        }
        tracing::debug!(
            table = %meta.name,
            requested = pks.len(),
            found = fetched.len(),
            "Fetched missing beans"
        );
        Some(fetched)
    }

    fn store_bean<T: Entity>(&self, cacher: &dyn Cacher, table: &str, bean: &T) {
        let pk = bean.primary_key();
        let result = encode_bean(&self.codec, bean)
            .and_then(|bytes| cacher.put_bean(table, &bean_id(&pk), &bytes));
        if let Err(e) = result {
            tracing::warn!(table, pk = %pk, error = %e, "Failed to cache bean");
        }
    }
}

impl<C: Codec + Clone> Session<C> {
    /// A handle whose reads skip the cache entirely.
    ///
    /// Writes through it still invalidate, so other sessions never read
    /// beans it has changed.
    pub fn no_cache(&self) -> Self {
        let mut session = self.clone();
        session.use_cache = false;
        session
    }
}
