//! Query executor contract.
//!
//! The executor runs final statements against the live store. The cache
//! path uses it as the miss fallback and to run rewritten key selects.

use crate::error::StrataResult;
use crate::value::{Row, SqlValue};
use async_trait::async_trait;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement that returns rows.
    async fn query(&self, sql: &str, args: &[SqlValue]) -> StrataResult<Vec<Row>>;

    /// Run a statement that modifies rows.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> StrataResult<ExecResult>;
}
