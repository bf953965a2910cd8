//! Strata Core - Shared Types and Contracts
//!
//! Data model for the cache-aware read/write path: primary keys, SQL values,
//! rows, table metadata, the entity, executor and dialect contracts, clocks,
//! configuration and the error taxonomy. Every other strata crate depends on
//! this one.

pub mod clock;
pub mod config;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod executor;
pub mod pk;
pub mod value;

pub use clock::{is_expired, Clock, ManualClock, SystemClock, Timestamp};
pub use config::CacheConfig;
pub use dialect::{Dialect, MsSqlDialect, MySqlDialect, ParamStyle, PostgresDialect};
pub use entity::{Entity, TableMeta};
pub use error::{
    CacheError, CacheResult, ConfigError, ExecutorError, RewriteError, StoreError, StrataError,
    StrataResult,
};
pub use executor::{ExecResult, Executor};
pub use pk::{Pk, PkValue};
pub use value::{Row, SqlValue};
