//! Strata SQL - Statement Scanning and Rewrites
//!
//! Turns find, delete and update statements into primary-key-only selects so
//! a generic cache can sit under an open-ended query builder. The scanner
//! only understands enough SQL to find top-level clause keywords.

pub mod rewrite;
pub mod scanner;

pub use rewrite::{analyze, rewrite_find, rewrite_update, QueryShape, UpdateRewrite};
pub use scanner::{tokenize, Marker, Scanner, Token, TokenKind};
