//! Strata Session - Cache-Aware Find and Mutate
//!
//! A [`Session`] runs statements through an [`Executor`](strata_core::Executor)
//! and consults the cache that the [`CacheManager`](strata_storage::CacheManager)
//! assigns to each table.
//!
//! Reads resolve the matching primary keys first (from the key-list cache or
//! a rewritten key-only select), then serve each row from the bean cache and
//! fetch the rest in one batched lookup. Writes resolve the rows they touch
//! before running, then invalidate those beans and the table's key lists.
//!
//! Cache failures never reach the caller. They are logged and the session
//! falls back to running the statement directly.

mod batch;
mod mutate;
mod session;

pub use session::Session;
