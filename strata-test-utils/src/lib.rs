//! Strata Test Utilities
//!
//! Shared test infrastructure for the strata workspace:
//! - A recording executor with scripted responses
//! - Sample entities with single and composite primary keys
//! - Proptest generators for keys, values and entities
//! - Fixtures and assertions for the cache path

pub use strata_core::{
    CacheConfig, CacheError, Entity, ExecResult, Executor, ExecutorError, ManualClock, Pk,
    PkValue, Row, SqlValue, StrataError, StrataResult, TableMeta,
};

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// RECORDING EXECUTOR
// ============================================================================

/// Which executor method a call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Execute,
}

/// One statement the executor was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub sql: String,
    pub args: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
enum QueryScript {
    Rows(Vec<Row>),
    Fail(String),
}

/// In-memory executor answering from scripts keyed by exact SQL text.
///
/// Every call is recorded, scripted or not. Unscripted statements fail, so a
/// test notices when the cache path issues a statement it did not expect.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    queries: Mutex<HashMap<String, QueryScript>>,
    executes: Mutex<HashMap<String, ExecResult>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `rows`, replacing any earlier script.
    pub fn on_query(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.into(), QueryScript::Rows(rows));
    }

    /// Make `sql` fail with a query error.
    pub fn fail_query(&self, sql: impl Into<String>, reason: impl Into<String>) {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.into(), QueryScript::Fail(reason.into()));
    }

    pub fn on_execute(&self, sql: impl Into<String>, result: ExecResult) {
        self.executes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.into(), result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `sql` was run, through either method.
    pub fn call_count(&self, sql: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.sql == sql)
            .count()
    }

    pub fn query_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.kind == CallKind::Query)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, kind: CallKind, sql: &str, args: &[SqlValue]) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                kind,
                sql: sql.to_string(),
                args: args.to_vec(),
            });
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Vec<Row>> {
        self.record(CallKind::Query, sql, args);
        let script = self
            .queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .cloned();
        match script {
            Some(QueryScript::Rows(rows)) => Ok(rows),
            Some(QueryScript::Fail(reason)) => Err(ExecutorError::QueryFailed { reason }.into()),
            None => Err(ExecutorError::QueryFailed {
                reason: format!("no scripted response for: {}", sql),
            }
            .into()),
        }
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> StrataResult<ExecResult> {
        self.record(CallKind::Execute, sql, args);
        self.executes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .copied()
            .ok_or_else(|| {
                ExecutorError::ExecFailed {
                    reason: format!("no scripted response for: {}", sql),
                }
                .into()
            })
    }
}

// ============================================================================
// SAMPLE ENTITIES
// ============================================================================

fn text_column(row: &Row, column: &str) -> Result<String, ExecutorError> {
    row.get(column)
        .and_then(SqlValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExecutorError::Conversion {
            column: column.to_string(),
            reason: "expected text".to_string(),
        })
}

fn int_column(row: &Row, column: &str) -> Result<i64, ExecutorError> {
    row.get(column)
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| ExecutorError::Conversion {
            column: column.to_string(),
            reason: "expected integer".to_string(),
        })
}

/// Entity with a single integer primary key, stored in `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>, age: i64) -> Self {
        Self {
            id,
            name: name.into(),
            age,
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("age", self.age)
    }

    pub fn pk_row(&self) -> Row {
        Row::new().with("id", self.id)
    }
}

impl Entity for User {
    fn table_meta() -> TableMeta {
        TableMeta::new("users")
            .with_pk("id")
            .with_column("name")
            .with_column("age")
    }

    fn primary_key(&self) -> Pk {
        Pk::single(self.id)
    }

    fn from_row(row: &Row) -> Result<Self, ExecutorError> {
        Ok(Self {
            id: int_column(row, "id")?,
            name: text_column(row, "name")?,
            age: int_column(row, "age")?,
        })
    }
}

/// Entity with a composite `(org, user_id)` primary key, stored in `memberships`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub org: String,
    pub user_id: i64,
    pub role: String,
}

impl Membership {
    pub fn new(org: impl Into<String>, user_id: i64, role: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            user_id,
            role: role.into(),
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("org", self.org.as_str())
            .with("user_id", self.user_id)
            .with("role", self.role.as_str())
    }

    pub fn pk_row(&self) -> Row {
        Row::new()
            .with("org", self.org.as_str())
            .with("user_id", self.user_id)
    }
}

impl Entity for Membership {
    fn table_meta() -> TableMeta {
        TableMeta::new("memberships")
            .with_pk("org")
            .with_pk("user_id")
            .with_column("role")
    }

    fn primary_key(&self) -> Pk {
        Pk::new(vec![
            PkValue::from(self.org.as_str()),
            PkValue::from(self.user_id),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, ExecutorError> {
        Ok(Self {
            org: text_column(row, "org")?,
            user_id: int_column(row, "user_id")?,
            role: text_column(row, "role")?,
        })
    }
}

/// Entity whose key column `order` is a reserved word, stored in `orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order: i64,
    pub item: String,
}

impl Order {
    pub fn new(order: i64, item: impl Into<String>) -> Self {
        Self {
            order,
            item: item.into(),
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("order", self.order)
            .with("item", self.item.as_str())
    }

    pub fn pk_row(&self) -> Row {
        Row::new().with("order", self.order)
    }
}

impl Entity for Order {
    fn table_meta() -> TableMeta {
        TableMeta::new("orders").with_pk("order").with_column("item")
    }

    fn primary_key(&self) -> Pk {
        Pk::single(self.order)
    }

    fn from_row(row: &Row) -> Result<Self, ExecutorError> {
        Ok(Self {
            order: int_column(row, "order")?,
            item: text_column(row, "item")?,
        })
    }
}

/// Entity without a primary key. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub line: String,
}

impl Entity for LogLine {
    fn table_meta() -> TableMeta {
        TableMeta::new("log_lines").with_column("line")
    }

    fn primary_key(&self) -> Pk {
        Pk::new(Vec::new())
    }

    fn from_row(row: &Row) -> Result<Self, ExecutorError> {
        Ok(Self {
            line: text_column(row, "line")?,
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for strata types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    pub fn arb_pk_value() -> impl Strategy<Value = PkValue> {
        prop_oneof![
            any::<i64>().prop_map(PkValue::Int),
            "[a-zA-Z0-9 ,\\[\\]\"-]{0,12}".prop_map(PkValue::Text),
            arb_uuid().prop_map(PkValue::Uuid),
        ]
    }

    pub fn arb_pk() -> impl Strategy<Value = Pk> {
        prop::collection::vec(arb_pk_value(), 1..4).prop_map(Pk::new)
    }

    pub fn arb_sql_value() -> impl Strategy<Value = SqlValue> {
        prop_oneof![
            Just(SqlValue::Null),
            any::<bool>().prop_map(SqlValue::Bool),
            any::<i64>().prop_map(SqlValue::Int),
            "[a-z ]{0,10}".prop_map(SqlValue::Text),
            arb_uuid().prop_map(SqlValue::Uuid),
        ]
    }

    pub fn arb_user() -> impl Strategy<Value = User> {
        (1i64..10_000, "[a-z]{1,12}", 0i64..120).prop_map(|(id, name, age)| User::new(id, name, age))
    }

    /// Users with distinct ids.
    pub fn arb_users(max: usize) -> impl Strategy<Value = Vec<User>> {
        prop::collection::btree_set(1i64..10_000, 0..max).prop_flat_map(|ids| {
            let ids: Vec<i64> = ids.into_iter().collect();
            let n = ids.len();
            (Just(ids), prop::collection::vec(("[a-z]{1,8}", 0i64..120), n))
        })
        .prop_map(|(ids, attrs)| {
            ids.into_iter()
                .zip(attrs)
                .map(|(id, (name, age))| User::new(id, name, age))
                .collect()
        })
    }

    pub fn arb_membership() -> impl Strategy<Value = Membership> {
        ("[a-z]{1,6}", 1i64..1_000, prop_oneof![Just("admin"), Just("member")])
            .prop_map(|(org, user_id, role)| Membership::new(org, user_id, role))
    }

    pub fn arb_cache_config() -> impl Strategy<Value = CacheConfig> {
        (1usize..64, 1u64..7_200, 1usize..50, 1usize..1_000).prop_map(
            |(max, ttl, removed, ids)| {
                CacheConfig::new()
                    .with_max_elements(max)
                    .with_ttl(std::time::Duration::from_secs(ttl))
                    .with_gc_max_removed(removed)
                    .with_max_cached_ids(ids)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common cache-path scenarios.

    use super::*;
    use std::sync::Arc;
    use strata_storage::{CacheManager, LruCacher, MemoryStore};

    pub fn alice() -> User {
        User::new(1, "alice", 30)
    }

    pub fn bob() -> User {
        User::new(2, "bob", 25)
    }

    pub fn carol() -> User {
        User::new(3, "carol", 41)
    }

    /// In-memory LRU cache driven by a manual clock.
    pub fn memory_cache(config: CacheConfig) -> (Arc<LruCacher>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = LruCacher::new(Arc::new(MemoryStore::new()), config).with_clock(clock.clone());
        (Arc::new(cache), clock)
    }

    /// Manager whose default is a fresh in-memory cache.
    pub fn cached_manager(config: CacheConfig) -> (Arc<CacheManager>, Arc<LruCacher>, Arc<ManualClock>) {
        let (cache, clock) = memory_cache(config);
        let manager = Arc::new(CacheManager::with_default(cache.clone()));
        (manager, cache, clock)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over strata results and recorded executor traffic.

    use super::*;

    pub fn assert_ok<T: std::fmt::Debug>(result: &StrataResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    pub fn assert_executor_error<T: std::fmt::Debug>(result: &StrataResult<T>) {
        match result {
            Err(StrataError::Executor(_)) => {}
            other => panic!("Expected executor error, got {:?}", other),
        }
    }

    pub fn assert_inconsistency<T: std::fmt::Debug>(result: &Result<T, CacheError>) {
        match result {
            Err(CacheError::Inconsistency { .. }) => {}
            other => panic!("Expected cache inconsistency, got {:?}", other),
        }
    }

    /// Assert `sql` was never sent to the executor.
    pub fn assert_not_called(executor: &RecordingExecutor, sql: &str) {
        let count = executor.call_count(sql);
        assert_eq!(count, 0, "Expected no calls to {:?}, saw {}", sql, count);
    }

    pub fn assert_called_times(executor: &RecordingExecutor, sql: &str, times: usize) {
        let count = executor.call_count(sql);
        assert_eq!(count, times, "Expected {} calls to {:?}, saw {}", times, sql, count);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_recording_executor_scripts_and_records() {
        let executor = RecordingExecutor::new();
        executor.on_query("SELECT 1", vec![Row::new().with("x", 1i64)]);
        executor.on_execute("DELETE FROM t", ExecResult::affected(3));

        let rows = executor.query("SELECT 1", &[]).await.expect("scripted query");
        assert_eq!(rows.len(), 1);
        let result = executor
            .execute("DELETE FROM t", &[SqlValue::Int(7)])
            .await
            .expect("scripted execute");
        assert_eq!(result.rows_affected, 3);

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].kind, CallKind::Execute);
        assert_eq!(calls[1].args, vec![SqlValue::Int(7)]);
        assert_eq!(executor.query_count(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_and_failing_statements_error() {
        let executor = RecordingExecutor::new();
        executor.fail_query("SELECT boom", "disk on fire");

        assertions::assert_executor_error(&executor.query("SELECT boom", &[]).await);
        assertions::assert_executor_error(&executor.query("SELECT nope", &[]).await);
        assertions::assert_executor_error(&executor.execute("UPDATE nope", &[]).await);
        assertions::assert_called_times(&executor, "SELECT boom", 1);
    }

    #[test]
    fn test_sample_entities_round_trip_rows() {
        let user = fixtures::alice();
        assert_eq!(User::from_row(&user.to_row()), Ok(user.clone()));
        assert_eq!(user.primary_key(), Pk::from_row(&user.pk_row(), &["id".to_string()]).expect("pk"));

        let membership = Membership::new("acme", 9, "admin");
        assert_eq!(Membership::from_row(&membership.to_row()), Ok(membership.clone()));
        assert!(Membership::table_meta().is_composite());
        let order = Order::new(7, "lamp");
        assert_eq!(Order::from_row(&order.to_row()), Ok(order.clone()));
        assert_eq!(Order::table_meta().pk_columns, vec!["order"]);
        assert!(!LogLine::table_meta().has_pk());
    }

    #[test]
    fn test_from_row_reports_bad_column() {
        let row = Row::new().with("id", "not a number").with("name", "x").with("age", 1i64);
        match User::from_row(&row) {
            Err(ExecutorError::Conversion { column, .. }) => assert_eq!(column, "id"),
            other => panic!("Expected conversion error, got {:?}", other),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_users_have_distinct_ids(users in generators::arb_users(16)) {
            let mut ids: Vec<i64> = users.iter().map(|u| u.id).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), users.len());
        }

        #[test]
        fn prop_generated_config_is_valid(config in generators::arb_cache_config()) {
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_generated_pk_is_non_empty(pk in generators::arb_pk()) {
            prop_assert!(!pk.is_empty());
        }
    }
}
