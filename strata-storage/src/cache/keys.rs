//! Cache key construction.
//!
//! Keys are plain strings namespaced by table, then by tier:
//! `table-b-<pk>` for beans and `table-q-<sql signature>` for primary-key
//! lists. Within a table the tier marker keeps the two namespaces disjoint
//! whatever the pk or signature text looks like.

use strata_core::{Pk, SqlValue};

/// Store key of a cached bean.
pub fn bean_key(table: &str, id: &str) -> String {
    format!("{}-b-{}", table, id)
}

/// Store key of a cached primary-key list.
pub fn ids_key(table: &str, signature: &str) -> String {
    format!("{}-q-{}", table, signature)
}

/// Ring key of a bean: the primary key's deterministic string form.
pub fn bean_id(pk: &Pk) -> String {
    pk.to_key()
}

/// The literal statement plus its arguments. No further normalization.
pub fn query_signature(sql: &str, args: &[SqlValue]) -> String {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("{}-[{}]", sql, rendered.join(","))
}
