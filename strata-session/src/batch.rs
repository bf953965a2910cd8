//! Secondary lookup for beans missing from the cache.

use strata_core::{Dialect, Pk, SqlValue, TableMeta};

/// Build one select fetching every row in `pks`.
///
/// Single-column keys use `IN (..)`; composite keys use a disjunction of
/// per-row equality groups. Placeholders are numbered from 1 in the
/// dialect's style.
pub(crate) fn bean_select(
    dialect: &dyn Dialect,
    meta: &TableMeta,
    pks: &[Pk],
) -> (String, Vec<SqlValue>) {
    let projection = if meta.columns.is_empty() {
        "*".to_string()
    } else {
        meta.columns
            .iter()
            .map(|c| dialect.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut args = Vec::with_capacity(pks.len() * meta.pk_columns.len());
    let mut next = 1usize;
    let mut placeholder = |value: SqlValue| {
        args.push(value);
        let marker = dialect.placeholder(next);
        next += 1;
        marker
    };

    let predicate = if let [column] = meta.pk_columns.as_slice() {
        let markers: Vec<String> = pks
            .iter()
            .flat_map(|pk| pk.to_args())
            .map(&mut placeholder)
            .collect();
        format!("{} IN ({})", dialect.quote(column), markers.join(", "))
    } else {
        let groups: Vec<String> = pks
            .iter()
            .map(|pk| {
                let terms: Vec<String> = meta
                    .pk_columns
                    .iter()
                    .zip(pk.to_args())
                    .map(|(column, value)| {
                        format!("{} = {}", dialect.quote(column), placeholder(value))
                    })
                    .collect();
                format!("({})", terms.join(" AND "))
            })
            .collect();
        groups.join(" OR ")
    };

    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        projection,
        dialect.quote(&meta.name),
        predicate
    );
    (sql, args)
}
