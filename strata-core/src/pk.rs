//! Primary key tuples.
//!
//! A [`Pk`] is an ordered tuple of scalar values identifying one row. Its
//! [`Display`](std::fmt::Display) form is deterministic and injective, so it
//! doubles as the bean key inside a cache.

use crate::error::ExecutorError;
use crate::value::{Row, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One scalar component of a primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkValue {
    Int(i64),
    Text(String),
    Uuid(Uuid),
}

impl fmt::Display for PkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkValue::Int(v) => write!(f, "{}", v),
            PkValue::Text(v) => write!(f, "{:?}", v),
            PkValue::Uuid(v) => write!(f, "uuid:{}", v),
        }
    }
}

impl From<i64> for PkValue {
    fn from(v: i64) -> Self {
        PkValue::Int(v)
    }
}

impl From<i32> for PkValue {
    fn from(v: i32) -> Self {
        PkValue::Int(i64::from(v))
    }
}

impl From<&str> for PkValue {
    fn from(v: &str) -> Self {
        PkValue::Text(v.to_string())
    }
}

impl From<String> for PkValue {
    fn from(v: String) -> Self {
        PkValue::Text(v)
    }
}

impl From<Uuid> for PkValue {
    fn from(v: Uuid) -> Self {
        PkValue::Uuid(v)
    }
}

impl From<PkValue> for SqlValue {
    fn from(v: PkValue) -> Self {
        match v {
            PkValue::Int(v) => SqlValue::Int(v),
            PkValue::Text(v) => SqlValue::Text(v),
            PkValue::Uuid(v) => SqlValue::Uuid(v),
        }
    }
}

impl PkValue {
    /// Convert a column value into a key component.
    ///
    /// Only integer, text and UUID columns can serve as primary keys.
    pub fn from_sql(column: &str, value: &SqlValue) -> Result<Self, ExecutorError> {
        match value {
            SqlValue::Int(v) => Ok(PkValue::Int(*v)),
            SqlValue::Text(v) => Ok(PkValue::Text(v.clone())),
            SqlValue::Uuid(v) => Ok(PkValue::Uuid(*v)),
            other => Err(ExecutorError::Conversion {
                column: column.to_string(),
                reason: format!("unsupported primary key value {}", other),
            }),
        }
    }
}

/// Ordered primary key tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pk(Vec<PkValue>);

impl Pk {
    pub fn new(values: Vec<PkValue>) -> Self {
        Self(values)
    }

    /// Single-column key.
    pub fn single(value: impl Into<PkValue>) -> Self {
        Self(vec![value.into()])
    }

    pub fn values(&self) -> &[PkValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic string form used as the bean key.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    /// The key components as SQL arguments, in column order.
    pub fn to_args(&self) -> Vec<SqlValue> {
        self.0.iter().cloned().map(SqlValue::from).collect()
    }

    /// Extract a key from a row using the entity's ordered key columns.
    pub fn from_row(row: &Row, pk_columns: &[String]) -> Result<Self, ExecutorError> {
        let mut values = Vec::with_capacity(pk_columns.len());
        for column in pk_columns {
            let value = row.get(column).ok_or_else(|| ExecutorError::Conversion {
                column: column.clone(),
                reason: "primary key column missing from row".to_string(),
            })?;
            values.push(PkValue::from_sql(column, value)?);
        }
        Ok(Self(values))
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

impl From<PkValue> for Pk {
    fn from(v: PkValue) -> Self {
        Pk::single(v)
    }
}
