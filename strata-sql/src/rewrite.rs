//! Primary-key projection rewrites.
//!
//! Caching arbitrary row shapes is unsafe, so the cache path only ever
//! caches which primary keys matched a statement. These functions turn a
//! find, delete or update statement into an equivalent statement selecting
//! only the primary key columns.

use crate::scanner::{tokenize, Marker, Token, TokenKind};
use strata_core::{RewriteError, SqlValue};

const AGGREGATES: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "GROUP_CONCAT",
    "STRING_AGG",
    "ARRAY_AGG",
    "JSON_AGG",
    "JSONB_AGG",
    "LISTAGG",
    "STDDEV",
    "VARIANCE",
];

const COMPOUND: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

// ============================================================================
// QUERY SHAPE
// ============================================================================

/// Top-level features of a find statement that make its result set
/// something other than a list of whole rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryShape {
    pub group_by: bool,
    pub having: bool,
    pub distinct: bool,
    pub aggregate: bool,
    pub compound: bool,
}

impl QueryShape {
    /// Whether a result of this shape can be served as a list of cached beans.
    pub fn is_cacheable(&self) -> bool {
        !(self.group_by || self.having || self.distinct || self.aggregate || self.compound)
    }
}

/// Report grouping, aggregation, DISTINCT and set operations in `sql`.
pub fn analyze(sql: &str) -> QueryShape {
    let tokens = tokenize(sql);
    let mut shape = QueryShape::default();

    for (i, token) in tokens.iter().enumerate() {
        if !token.is_top_level() {
            continue;
        }
        if token.is_word(sql, "group") && next_is_word(&tokens, i, sql, "by") {
            shape.group_by = true;
        } else if token.is_word(sql, "having") {
            shape.having = true;
        } else if COMPOUND.iter().any(|kw| token.is_word(sql, kw)) {
            shape.compound = true;
        }
    }

    if let Some(select) = find_top_level(&tokens, sql, 0, &["select"]) {
        shape.distinct = next_is_word(&tokens, select, sql, "distinct");

        let projection_end =
            find_top_level(&tokens, sql, select + 1, &["from"]).unwrap_or(tokens.len());
        shape.aggregate = (select + 1..projection_end).any(|i| {
            let token = &tokens[i];
            token.kind == TokenKind::Word
                && AGGREGATES.iter().any(|f| token.is_word(sql, f))
                && tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::LParen)
        });
    }

    shape
}

// ============================================================================
// FIND / DELETE
// ============================================================================

/// Rewrite a find or delete statement into a primary-key-only select.
///
/// `pk_columns` are already-rendered identifiers, in key order. Everything
/// from the top-level `FROM` onward is kept verbatim, as is a `TOP n` row
/// limit, so arguments bind exactly as they did against the original.
///
/// ```
/// use strata_sql::rewrite_find;
///
/// let sql = rewrite_find("SELECT * FROM t WHERE x=? ORDER BY y", &["id".to_string()]).unwrap();
/// assert_eq!(sql, "SELECT id FROM t WHERE x=? ORDER BY y");
/// ```
pub fn rewrite_find(sql: &str, pk_columns: &[String]) -> Result<String, RewriteError> {
    if pk_columns.is_empty() {
        return Err(RewriteError::not_rewritable("entity has no primary key columns"));
    }

    let tokens = tokenize(sql);
    let head = find_top_level(&tokens, sql, 0, &["select", "delete"])
        .ok_or_else(|| RewriteError::not_rewritable("no SELECT or DELETE keyword"))?;

    if tokens
        .iter()
        .any(|t| t.is_top_level() && COMPOUND.iter().any(|kw| t.is_word(sql, kw)))
    {
        return Err(RewriteError::not_rewritable("compound select"));
    }

    let mut cursor = head + 1;
    if next_is_word(&tokens, head, sql, "distinct") {
        return Err(RewriteError::not_rewritable("DISTINCT projection"));
    }
    if next_is_word(&tokens, head, sql, "all") {
        cursor += 1;
    }
    let top = take_top_clause(&tokens, sql, &mut cursor)
        .map(|(first, last)| &sql[tokens[first].start..tokens[last].end]);

    let from = find_top_level(&tokens, sql, cursor, &["from"])
        .ok_or_else(|| RewriteError::not_rewritable("no top-level FROM clause"))?;

    let mut out = String::with_capacity(sql.len());
    out.push_str(&sql[..tokens[head].start]);
    out.push_str("SELECT ");
    if let Some(top) = top {
        out.push_str(top);
        out.push(' ');
    }
    out.push_str(&pk_columns.join(", "));
    out.push(' ');
    out.push_str(&sql[tokens[from].start..]);
    Ok(out)
}

// ============================================================================
// UPDATE
// ============================================================================

/// The filter half of an update statement, re-projected as a key select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRewrite {
    /// Table clause exactly as written between `UPDATE` and `SET`.
    pub table: String,
    /// `SELECT <pk> FROM <table> <filter>`, with markers re-indexed.
    pub select_sql: String,
    /// Number of arguments bound by the assignment clause.
    pub filter_arg_offset: usize,
    /// Original argument index for each parameter of `select_sql`.
    arg_map: Vec<usize>,
}

impl UpdateRewrite {
    /// Pick the arguments `select_sql` binds, in order, from the update's arguments.
    pub fn filter_args(&self, args: &[SqlValue]) -> Vec<SqlValue> {
        self.arg_map
            .iter()
            .filter_map(|&i| args.get(i).cloned())
            .collect()
    }
}

/// Split an update into its assignment and filter clauses and re-project the
/// filter as a primary-key select, so affected rows can be found before the
/// update runs.
///
/// A `TOP` row limit is kept and binds first. `?` markers keep their order
/// and the filter takes the arguments after the assignment clause. Numbered
/// markers (`$n`, `@pn`) are renumbered from 1 in order of first use.
pub fn rewrite_update(sql: &str, pk_columns: &[String]) -> Result<UpdateRewrite, RewriteError> {
    if pk_columns.is_empty() {
        return Err(RewriteError::not_rewritable("entity has no primary key columns"));
    }

    let tokens = tokenize(sql);
    let update = match tokens.first() {
        Some(t) if t.is_word(sql, "update") => 0,
        _ => return Err(RewriteError::not_rewritable("statement does not start with UPDATE")),
    };

    let mut cursor = update + 1;
    let top_tokens = match take_top_clause(&tokens, sql, &mut cursor) {
        Some((first, last)) => &tokens[first..=last],
        None => &tokens[0..0],
    };

    let set = find_top_level(&tokens, sql, cursor, &["set"])
        .ok_or_else(|| RewriteError::not_rewritable("no top-level SET clause"))?;
    let table_tokens = &tokens[cursor..set];
    if table_tokens.is_empty() {
        return Err(RewriteError::not_rewritable("no table before SET"));
    }
    if table_tokens
        .iter()
        .any(|t| t.kind == TokenKind::Comma || t.is_word(sql, "join"))
    {
        return Err(RewriteError::not_rewritable("multi-table update"));
    }
    let table = sql[table_tokens[0].start..table_tokens[table_tokens.len() - 1].end].to_string();

    let split = find_top_level(&tokens, sql, set + 1, &["where", "order", "limit", "returning"]);
    let assign_end = split.unwrap_or(tokens.len());
    if find_top_level(&tokens[..assign_end], sql, set + 1, &["from"]).is_some() {
        return Err(RewriteError::not_rewritable("update with FROM clause"));
    }
    let filter_end =
        find_top_level(&tokens, sql, set + 1, &["returning"]).unwrap_or(tokens.len());

    let head_markers = markers(&tokens[..assign_end]);
    let top_markers = markers(top_tokens);
    let filter_tokens = match split {
        Some(s) if s < filter_end => &tokens[s..filter_end],
        _ => &tokens[0..0],
    };
    let filter_markers = markers(filter_tokens);

    let numbered = head_markers
        .iter()
        .chain(filter_markers.iter())
        .any(|(_, m)| matches!(m, Marker::Numbered { .. }));
    let questions = head_markers
        .iter()
        .chain(filter_markers.iter())
        .any(|(_, m)| *m == Marker::Question);
    if numbered && questions {
        return Err(RewriteError::not_rewritable("mixed parameter marker styles"));
    }

    // The select binds the row limit's markers first, then the filter's.
    let (filter_arg_offset, arg_map) = if numbered {
        let offset = head_markers
            .iter()
            .filter_map(|(_, m)| match m {
                Marker::Numbered { index, .. } => Some(*index),
                Marker::Question => None,
            })
            .max()
            .unwrap_or(0);
        let mut order: Vec<usize> = Vec::new();
        for (_, m) in top_markers.iter().chain(filter_markers.iter()) {
            if let Marker::Numbered { index, .. } = m {
                if !order.contains(index) {
                    order.push(*index);
                }
            }
        }
        if order.iter().any(|&i| i == 0) {
            return Err(RewriteError::not_rewritable("parameter index 0"));
        }
        (offset, order.iter().map(|i| i - 1).collect::<Vec<_>>())
    } else {
        // `TOP` comes right after UPDATE, so its markers are the first arguments.
        let offset = head_markers.len();
        let arg_map: Vec<usize> = (0..top_markers.len())
            .chain(offset..offset + filter_markers.len())
            .collect();
        (offset, arg_map)
    };

    let mut select_sql = String::with_capacity(sql.len());
    select_sql.push_str("SELECT ");
    if !top_tokens.is_empty() {
        render_renumbered(sql, top_tokens, &arg_map, &mut select_sql);
        select_sql.push(' ');
    }
    select_sql.push_str(&pk_columns.join(", "));
    select_sql.push_str(" FROM ");
    select_sql.push_str(&table);
    if !filter_tokens.is_empty() {
        select_sql.push(' ');
        render_renumbered(sql, filter_tokens, &arg_map, &mut select_sql);
    }

    Ok(UpdateRewrite {
        table,
        select_sql,
        filter_arg_offset,
        arg_map,
    })
}

// ============================================================================
// HELPERS
// ============================================================================

/// Index of the first top-level word in `keywords` at or after `from`.
fn find_top_level(tokens: &[Token], sql: &str, from: usize, keywords: &[&str]) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, t)| t.is_top_level() && keywords.iter().any(|kw| t.is_word(sql, kw)))
        .map(|(i, _)| i)
}

fn next_is_word(tokens: &[Token], i: usize, sql: &str, keyword: &str) -> bool {
    tokens
        .get(i + 1)
        .map(|t| t.is_word(sql, keyword))
        .unwrap_or(false)
}

/// Consume `TOP n` or `TOP (expr)` at `cursor`, returning its first and
/// last token indices.
fn take_top_clause(tokens: &[Token], sql: &str, cursor: &mut usize) -> Option<(usize, usize)> {
    let first = *cursor;
    tokens.get(first).filter(|t| t.is_word(sql, "top"))?;
    let arg = tokens.get(*cursor + 1)?;
    let end = match arg.kind {
        TokenKind::Number | TokenKind::Placeholder(_) => *cursor + 1,
        TokenKind::LParen => tokens
            .iter()
            .enumerate()
            .skip(*cursor + 2)
            .find(|(_, t)| t.kind == TokenKind::RParen && t.depth == arg.depth)
            .map(|(i, _)| i)?,
        _ => return None,
    };
    let mut last = end;
    if next_is_word(tokens, last, sql, "percent") {
        last += 1;
    }
    if next_is_word(tokens, last, sql, "with") && next_is_word(tokens, last + 1, sql, "ties") {
        last += 2;
    }
    *cursor = last + 1;
    Some((first, last))
}

/// Copy the source text of `span`, renumbering each numbered marker to its
/// position in `arg_map`.
fn render_renumbered(sql: &str, span: &[Token], arg_map: &[usize], out: &mut String) {
    let (Some(first), Some(last)) = (span.first(), span.last()) else {
        return;
    };
    let mut cursor = first.start;
    for (token, marker) in markers(span) {
        out.push_str(&sql[cursor..token.start]);
        match marker {
            Marker::Question => out.push('?'),
            Marker::Numbered { prefix_len, index } => {
                let renumbered = arg_map
                    .iter()
                    .position(|&i| i + 1 == index)
                    .map(|p| p + 1)
                    .unwrap_or(index);
                out.push_str(&sql[token.start..token.start + prefix_len]);
                out.push_str(&renumbered.to_string());
            }
        }
        cursor = token.end;
    }
    out.push_str(&sql[cursor..last.end]);
}

fn markers(tokens: &[Token]) -> Vec<(Token, Marker)> {
    tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Placeholder(m) => Some((*t, m)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pk(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_rewrite_find_replaces_projection_only() {
        let out = rewrite_find("SELECT * FROM t WHERE x=? ORDER BY y", &pk(&["id"])).unwrap();
        assert_eq!(out, "SELECT id FROM t WHERE x=? ORDER BY y");
    }

    #[test]
    fn test_rewrite_find_composite_key() {
        let out = rewrite_find(
            "select a.*, b.name from orders a join users b on a.uid = b.id where b.id = ?",
            &pk(&["a.tenant", "a.id"]),
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT a.tenant, a.id from orders a join users b on a.uid = b.id where b.id = ?"
        );
    }

    #[test]
    fn test_rewrite_find_preserves_top_clause() {
        let out = rewrite_find("SELECT TOP 10 * FROM t WHERE a = @p1", &pk(&["[id]"])).unwrap();
        assert_eq!(out, "SELECT TOP 10 [id] FROM t WHERE a = @p1");

        let out = rewrite_find("SELECT TOP (5) PERCENT name FROM t", &pk(&["id"])).unwrap();
        assert_eq!(out, "SELECT TOP (5) PERCENT id FROM t");
    }

    #[test]
    fn test_rewrite_find_keeps_limit_and_subqueries() {
        let sql = "SELECT name, (SELECT count(*) FROM posts p WHERE p.uid = u.id) FROM users u \
                   WHERE u.id IN (SELECT uid FROM bans) LIMIT 5 OFFSET 10";
        let out = rewrite_find(sql, &pk(&["u.id"])).unwrap();
        assert_eq!(
            out,
            "SELECT u.id FROM users u WHERE u.id IN (SELECT uid FROM bans) LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_rewrite_find_ignores_from_in_literals() {
        let sql = "SELECT 'x FROM y' AS label, \"from\" FROM t WHERE s = 'FROM'";
        let out = rewrite_find(sql, &pk(&["id"])).unwrap();
        assert_eq!(out, "SELECT id FROM t WHERE s = 'FROM'");
    }

    #[test]
    fn test_rewrite_find_delete() {
        let out = rewrite_find("DELETE FROM `users` WHERE `age` > ?", &pk(&["`id`"])).unwrap();
        assert_eq!(out, "SELECT `id` FROM `users` WHERE `age` > ?");
    }

    #[test]
    fn test_rewrite_find_keeps_cte_prefix() {
        let sql = "WITH recent AS (SELECT id FROM t WHERE ts > ?) SELECT * FROM t JOIN recent USING (id)";
        let out = rewrite_find(sql, &pk(&["t.id"])).unwrap();
        assert_eq!(
            out,
            "WITH recent AS (SELECT id FROM t WHERE ts > ?) SELECT t.id FROM t JOIN recent USING (id)"
        );
    }

    #[test]
    fn test_rewrite_find_not_rewritable() {
        assert!(rewrite_find("SELECT * FROM t", &[]).is_err());
        assert!(rewrite_find("SELECT 1", &pk(&["id"])).is_err());
        assert!(rewrite_find("SELECT DISTINCT name FROM t", &pk(&["id"])).is_err());
        assert!(rewrite_find("SELECT a FROM t UNION SELECT a FROM u", &pk(&["id"])).is_err());
        assert!(rewrite_find("INSERT INTO t VALUES (1)", &pk(&["id"])).is_err());
    }

    #[test]
    fn test_rewrite_update_question_markers() {
        let rw = rewrite_update(
            "UPDATE users SET name = ?, age = ? WHERE dept = ? AND age > ?",
            &pk(&["id"]),
        )
        .unwrap();
        assert_eq!(rw.table, "users");
        assert_eq!(rw.select_sql, "SELECT id FROM users WHERE dept = ? AND age > ?");
        assert_eq!(rw.filter_arg_offset, 2);

        let args: Vec<SqlValue> = vec!["n".into(), 3i64.into(), "eng".into(), 30i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::from("eng"), SqlValue::Int(30)]);
    }

    #[test]
    fn test_rewrite_update_numbered_markers_reindexed() {
        let rw = rewrite_update(
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"dept\" = $2 AND \"age\" > $3",
            &pk(&["\"id\""]),
        )
        .unwrap();
        assert_eq!(
            rw.select_sql,
            "SELECT \"id\" FROM \"users\" WHERE \"dept\" = $1 AND \"age\" > $2"
        );
        assert_eq!(rw.filter_arg_offset, 1);

        let args: Vec<SqlValue> = vec!["n".into(), "eng".into(), 30i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::from("eng"), SqlValue::Int(30)]);
    }

    #[test]
    fn test_rewrite_update_numbered_reuse_and_order() {
        let rw = rewrite_update(
            "UPDATE t SET a = @p1, b = @p2 WHERE c = @p4 OR d = @p3 OR e = @p4",
            &pk(&["id"]),
        )
        .unwrap();
        assert_eq!(rw.select_sql, "SELECT id FROM t WHERE c = @p1 OR d = @p2 OR e = @p1");
        let args: Vec<SqlValue> = vec![1i64.into(), 2i64.into(), 3i64.into(), 4i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::Int(4), SqlValue::Int(3)]);
    }

    #[test]
    fn test_rewrite_update_without_where() {
        let rw = rewrite_update("UPDATE t SET a = ?", &pk(&["id"])).unwrap();
        assert_eq!(rw.select_sql, "SELECT id FROM t");
        assert_eq!(rw.filter_arg_offset, 1);
        assert!(rw.filter_args(&[SqlValue::Int(1)]).is_empty());
    }

    #[test]
    fn test_rewrite_update_set_value_with_where_literal() {
        let rw = rewrite_update(
            "UPDATE t SET note = 'set WHERE ?', n = ? WHERE id = ? RETURNING *",
            &pk(&["id"]),
        )
        .unwrap();
        assert_eq!(rw.select_sql, "SELECT id FROM t WHERE id = ?");
        assert_eq!(rw.filter_arg_offset, 1);
    }

    #[test]
    fn test_rewrite_update_top_and_limit() {
        let rw = rewrite_update("UPDATE TOP (3) t SET a = 1 WHERE b = 2", &pk(&["id"])).unwrap();
        assert_eq!(rw.select_sql, "SELECT TOP (3) id FROM t WHERE b = 2");

        let rw = rewrite_update("UPDATE t SET a = ? ORDER BY b LIMIT 2", &pk(&["id"])).unwrap();
        assert_eq!(rw.select_sql, "SELECT id FROM t ORDER BY b LIMIT 2");
    }

    #[test]
    fn test_rewrite_update_numbered_top_binds_its_own_argument() {
        let rw = rewrite_update("UPDATE TOP (@p1) t SET a = @p2 WHERE b = @p3", &pk(&["id"]))
            .unwrap();
        assert_eq!(rw.select_sql, "SELECT TOP (@p1) id FROM t WHERE b = @p2");

        let args: Vec<SqlValue> = vec![5i64.into(), "x".into(), 1i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::Int(5), SqlValue::Int(1)]);
    }

    #[test]
    fn test_rewrite_update_question_top_binds_first_argument() {
        let rw = rewrite_update("UPDATE TOP (?) t SET a = ? WHERE b = ?", &pk(&["id"])).unwrap();
        assert_eq!(rw.select_sql, "SELECT TOP (?) id FROM t WHERE b = ?");
        assert_eq!(rw.filter_arg_offset, 2);

        let args: Vec<SqlValue> = vec![5i64.into(), "x".into(), 1i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::Int(5), SqlValue::Int(1)]);
    }

    #[test]
    fn test_rewrite_update_top_marker_shared_with_filter() {
        let rw = rewrite_update(
            "UPDATE TOP ($3) t SET a = $1 WHERE b = $2 AND c < $3",
            &pk(&["id"]),
        )
        .unwrap();
        assert_eq!(rw.select_sql, "SELECT TOP ($1) id FROM t WHERE b = $2 AND c < $1");

        let args: Vec<SqlValue> = vec!["x".into(), 7i64.into(), 4i64.into()];
        assert_eq!(rw.filter_args(&args), vec![SqlValue::Int(4), SqlValue::Int(7)]);
    }

    #[test]
    fn test_rewrite_update_not_rewritable() {
        assert!(rewrite_update("UPDATE t SET a = 1", &[]).is_err());
        assert!(rewrite_update("DELETE FROM t", &pk(&["id"])).is_err());
        assert!(rewrite_update("UPDATE t", &pk(&["id"])).is_err());
        assert!(rewrite_update("UPDATE SET a = 1", &pk(&["id"])).is_err());
        assert!(rewrite_update("UPDATE a, b SET a.x = b.x", &pk(&["id"])).is_err());
        assert!(rewrite_update("UPDATE a JOIN b ON a.k = b.k SET a.x = 1", &pk(&["id"])).is_err());
        assert!(
            rewrite_update("UPDATE a SET x = b.x FROM b WHERE a.k = b.k", &pk(&["id"])).is_err()
        );
        assert!(rewrite_update("UPDATE t SET a = ? WHERE b = $1", &pk(&["id"])).is_err());
    }

    #[test]
    fn test_analyze_shapes() {
        assert!(analyze("SELECT * FROM t WHERE a = ?").is_cacheable());

        let shape = analyze("SELECT dept, count(*) FROM t GROUP BY dept HAVING count(*) > 1");
        assert!(shape.group_by && shape.having && shape.aggregate);
        assert!(!shape.is_cacheable());

        assert!(analyze("SELECT DISTINCT a FROM t").distinct);
        assert!(analyze("SELECT MAX(id) FROM t").aggregate);
        assert!(analyze("SELECT a FROM t UNION ALL SELECT a FROM u").compound);
    }

    #[test]
    fn test_analyze_ignores_nested_and_quoted() {
        let shape = analyze(
            "SELECT * FROM t WHERE id IN (SELECT uid FROM u GROUP BY uid) AND note = 'GROUP BY'",
        );
        assert!(shape.is_cacheable());

        // A column named like an aggregate is not a call.
        assert!(!analyze("SELECT max, min FROM t").aggregate);
        // Aggregates in the filter do not change the projection.
        assert!(!analyze("SELECT * FROM t WHERE a > (SELECT AVG(a) FROM t)").aggregate);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: the find rewrite keeps everything from FROM onward verbatim.
        #[test]
        fn prop_rewrite_find_preserves_tail(
            table in "[a-z]{1,8}",
            col in "[a-z]{1,8}",
            n_markers in 0usize..4,
            order in proptest::option::of("[a-z]{1,8}"),
        ) {
            let mut filter = String::new();
            for i in 0..n_markers {
                if i > 0 {
                    filter.push_str(" AND ");
                }
                filter.push_str(&format!("c_{} = ?", col));
            }
            let mut tail = format!("FROM t_{}", table);
            if !filter.is_empty() {
                tail.push_str(" WHERE ");
                tail.push_str(&filter);
            }
            if let Some(order) = order {
                tail.push_str(" ORDER BY c_");
                tail.push_str(&order);
            }
            let sql = format!("SELECT c_{}, other FROM t_{}", col, &tail["FROM t_".len()..]);
            let out = rewrite_find(&sql, &["id".to_string()]).unwrap();
            prop_assert_eq!(out, format!("SELECT id {}", tail));
        }

        /// Property: an update's filter select binds exactly the trailing arguments.
        #[test]
        fn prop_rewrite_update_arg_split(n_assign in 1usize..4, n_filter in 0usize..4) {
            let assigns: Vec<String> = (0..n_assign).map(|i| format!("c{} = ?", i)).collect();
            let filters: Vec<String> = (0..n_filter).map(|i| format!("f{} = ?", i)).collect();
            let mut sql = format!("UPDATE t SET {}", assigns.join(", "));
            if !filters.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&filters.join(" AND "));
            }
            let args: Vec<SqlValue> = (0..(n_assign + n_filter) as i64).map(SqlValue::Int).collect();

            let rw = rewrite_update(&sql, &["id".to_string()]).unwrap();
            prop_assert_eq!(rw.filter_arg_offset, n_assign);
            prop_assert_eq!(rw.filter_args(&args), args[n_assign..].to_vec());
            prop_assert_eq!(rw.select_sql.matches('?').count(), n_filter);
        }
    }
}
