//! Error types for strata operations

use thiserror::Error;

/// Byte store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Key does not exist: {key}")]
    NotExist { key: String },

    #[error("Store backend failed: {reason}")]
    Backend { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// True when the key is simply absent, which callers treat as a miss.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, StoreError::NotExist { .. })
    }
}

/// Cache layer errors.
///
/// A miss is not an error: cache reads return `Ok(None)` for absent or
/// expired entries. Everything here is absorbed by the session and
/// downgraded to a miss or a skipped invalidation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Encode failure: {reason}")]
    Encode { reason: String },

    #[error("Decode failure: {reason}")]
    Decode { reason: String },

    #[error("Cache inconsistency on {table}: {reason}")]
    Inconsistency { table: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Query rewriting errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("Statement not rewritable: {reason}")]
    NotRewritable { reason: String },
}

impl RewriteError {
    pub fn not_rewritable(reason: impl Into<String>) -> Self {
        RewriteError::NotRewritable {
            reason: reason.into(),
        }
    }
}

/// Errors reported by the query executor collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Exec failed: {reason}")]
    ExecFailed { reason: String },

    #[error("Row conversion failed for column {column}: {reason}")]
    Conversion { column: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all strata errors.
#[derive(Debug, Clone, Error)]
pub enum StrataError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Result type alias for cache-contract operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_not_exist() {
        let err = StoreError::NotExist {
            key: "users-b-[1]".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("does not exist"));
        assert!(msg.contains("users-b-[1]"));
        assert!(err.is_not_exist());
        assert!(!StoreError::LockPoisoned.is_not_exist());
    }

    #[test]
    fn test_cache_error_wraps_store_error() {
        let err = CacheError::from(StoreError::Backend {
            reason: "disk full".to_string(),
        });
        assert!(matches!(err, CacheError::Store(StoreError::Backend { .. })));
        assert!(format!("{}", err).contains("disk full"));
    }

    #[test]
    fn test_cache_error_display_inconsistency() {
        let err = CacheError::Inconsistency {
            table: "users".to_string(),
            reason: "expected [1], decoded [2]".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("inconsistency"));
        assert!(msg.contains("users"));
    }

    #[test]
    fn test_rewrite_error_display() {
        let err = RewriteError::not_rewritable("no primary key");
        assert!(format!("{}", err).contains("no primary key"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "max_element_size".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("max_element_size"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_strata_error_from_variants() {
        let store = StrataError::from(StoreError::LockPoisoned);
        assert!(matches!(store, StrataError::Store(_)));

        let cache = StrataError::from(CacheError::LockPoisoned);
        assert!(matches!(cache, StrataError::Cache(_)));

        let rewrite = StrataError::from(RewriteError::not_rewritable("x"));
        assert!(matches!(rewrite, StrataError::Rewrite(_)));

        let exec = StrataError::from(ExecutorError::QueryFailed {
            reason: "timeout".to_string(),
        });
        assert!(matches!(exec, StrataError::Executor(_)));

        let config = StrataError::from(ConfigError::MissingRequired {
            field: "ttl".to_string(),
        });
        assert!(matches!(config, StrataError::Config(_)));
    }
}
