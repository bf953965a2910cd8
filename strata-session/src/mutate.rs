//! Write paths and explicit cache clearing.
//!
//! Affected keys are resolved before the write runs, since afterwards a
//! delete has removed them and an update may have moved them out of its own
//! filter. Invalidation happens only once the write has succeeded.

use strata_core::{Entity, ExecResult, Pk, SqlValue, StrataResult, TableMeta};
use strata_sql::{rewrite_find, rewrite_update};
use strata_storage::{bean_id, Cacher, Codec};

use crate::session::Session;

impl<C: Codec> Session<C> {
    /// Run a delete and evict the rows it removed.
    pub async fn delete<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<ExecResult> {
        let meta = T::table_meta();
        let Some(cacher) = self.manager.get_cacher(&meta.name) else {
            return self.executor.execute(sql, args).await;
        };

        let affected = match rewrite_find(sql, &self.quoted_pk(&meta)) {
            Ok(pk_sql) => self.select_keys(&meta, &pk_sql, args).await,
            Err(e) => {
                tracing::debug!(table = %meta.name, error = %e, "Delete keys not resolvable");
                None
            }
        };

        let result = self.executor.execute(sql, args).await?;
        invalidate(cacher.as_ref(), &meta, affected.as_deref());
        Ok(result)
    }

    /// Run an update and evict the rows it touched.
    ///
    /// Cached beans are dropped, not patched, so the next read sees exactly
    /// what the store holds.
    pub async fn update<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<ExecResult> {
        let meta = T::table_meta();
        let Some(cacher) = self.manager.get_cacher(&meta.name) else {
            return self.executor.execute(sql, args).await;
        };

        let affected = match rewrite_update(sql, &self.quoted_pk(&meta)) {
            Ok(rewrite) => {
                let filter_args = rewrite.filter_args(args);
                self.select_keys(&meta, &rewrite.select_sql, &filter_args).await
            }
            Err(e) => {
                tracing::debug!(table = %meta.name, error = %e, "Update keys not resolvable");
                None
            }
        };

        let result = self.executor.execute(sql, args).await?;
        invalidate(cacher.as_ref(), &meta, affected.as_deref());
        Ok(result)
    }

    /// Run an insert. New rows may satisfy any cached filter, so the
    /// table's key lists are dropped. Cached beans stay valid.
    pub async fn insert<T: Entity>(&self, sql: &str, args: &[SqlValue]) -> StrataResult<ExecResult> {
        let meta = T::table_meta();
        let result = self.executor.execute(sql, args).await?;
        if let Some(cacher) = self.manager.get_cacher(&meta.name) {
            clear_ids(cacher.as_ref(), &meta.name);
        }
        Ok(result)
    }

    /// Evict one bean of `T`, along with the table's key lists.
    pub fn clear_cache_bean<T: Entity>(&self, pk: &Pk) {
        let meta = T::table_meta();
        if let Some(cacher) = self.manager.get_cacher(&meta.name) {
            if let Err(e) = cacher.del_bean(&meta.name, &bean_id(pk)) {
                tracing::warn!(table = %meta.name, pk = %pk, error = %e, "Failed to evict bean");
            }
        }
    }

    /// Evict everything cached for `T`'s table.
    pub fn clear_cache<T: Entity>(&self) {
        let meta = T::table_meta();
        if let Some(cacher) = self.manager.get_cacher(&meta.name) {
            if let Err(e) = cacher.clear_beans(&meta.name) {
                tracing::warn!(table = %meta.name, error = %e, "Failed to clear bean cache");
            }
            clear_ids(cacher.as_ref(), &meta.name);
        }
    }
}

/// Drop the beans in `affected` and every key list for the table.
///
/// When the affected keys are unknown, the table's whole bean tier goes.
/// Entities without a primary key are never cached, so there is nothing to do.
fn invalidate(cacher: &dyn Cacher, meta: &TableMeta, affected: Option<&[Pk]>) {
    if !meta.has_pk() {
        return;
    }
    match affected {
        Some(pks) => {
            for pk in pks {
                if let Err(e) = cacher.del_bean(&meta.name, &bean_id(pk)) {
                    tracing::warn!(table = %meta.name, pk = %pk, error = %e, "Failed to evict bean");
                }
            }
            tracing::debug!(table = %meta.name, evicted = pks.len(), "Invalidated written rows");
        }
        None => {
            tracing::warn!(table = %meta.name, "Written rows unknown, clearing bean cache");
            if let Err(e) = cacher.clear_beans(&meta.name) {
                tracing::warn!(table = %meta.name, error = %e, "Failed to clear bean cache");
            }
        }
    }
    clear_ids(cacher, &meta.name);
}

fn clear_ids(cacher: &dyn Cacher, table: &str) {
    if let Err(e) = cacher.clear_ids(table) {
        tracing::warn!(table, error = %e, "Failed to clear key lists");
    }
}
