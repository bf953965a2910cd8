//! Table metadata and the entity contract.

use crate::error::ExecutorError;
use crate::pk::Pk;
use crate::value::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Table name, ordered primary key columns and full column list for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub pk_columns: Vec<String>,
    pub columns: Vec<String>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk_columns: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Add a primary key column. It is also appended to the column list.
    pub fn with_pk(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.columns.push(column.clone());
        self.pk_columns.push(column);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn has_pk(&self) -> bool {
        !self.pk_columns.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.pk_columns.len() > 1
    }
}

/// A mapped application type.
///
/// This is the metadata provider contract: implementors report their table
/// shape, extract their own key, and build themselves from a row. Serde
/// bounds let beans travel through the cache codec.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn table_meta() -> TableMeta;

    fn primary_key(&self) -> Pk;

    fn from_row(row: &Row) -> Result<Self, ExecutorError>;

    /// Stable tag written into cached bean envelopes.
    fn type_tag() -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_meta_builder() {
        let meta = TableMeta::new("orders")
            .with_pk("tenant")
            .with_pk("id")
            .with_column("total");
        assert_eq!(meta.name, "orders");
        assert_eq!(meta.pk_columns, vec!["tenant", "id"]);
        assert_eq!(meta.columns, vec!["tenant", "id", "total"]);
        assert!(meta.has_pk());
        assert!(meta.is_composite());
    }

    #[test]
    fn test_table_without_pk() {
        let meta = TableMeta::new("logs").with_column("line");
        assert!(!meta.has_pk());
        assert!(!meta.is_composite());
    }
}
