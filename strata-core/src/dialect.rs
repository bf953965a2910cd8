//! Vendor SQL syntax consumed by the rewriter and the session.
//!
//! Only the pieces the cache path needs live here: identifier quoting and
//! positional parameter markers. Row-limit syntax is carried through the
//! rewriter untouched.

use std::fmt;

/// How a backend spells positional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// Anonymous `?` markers, bound by position.
    Question,
    /// Numbered markers such as `$1` or `@p1`, starting at 1.
    Numbered { prefix: &'static str },
}

pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn param_style(&self) -> ParamStyle;

    /// Quote an identifier.
    fn quote(&self, ident: &str) -> String;

    /// Marker for the 1-based parameter `n`.
    fn placeholder(&self, n: usize) -> String {
        match self.param_style() {
            ParamStyle::Question => "?".to_string(),
            ParamStyle::Numbered { prefix } => format!("{}{}", prefix, n),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Question
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered { prefix: "$" }
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered { prefix: "@p" }
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }
}
