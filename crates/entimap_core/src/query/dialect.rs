//! SQL dialects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dialect-specific SQL fragments.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Dialect name, for logs.
    fn name(&self) -> &'static str;

    /// Quotes an identifier.
    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    /// Clause appended after ORDER BY to fetch one page.
    fn paging_clause(&self, offset: u64, size: u64) -> String;

    /// Query returning the identity assigned by the last insert.
    fn last_insert_id(&self) -> &'static str;
}

/// SQL Server: `OFFSET .. FETCH NEXT` paging and `SCOPE_IDENTITY()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn paging_clause(&self, offset: u64, size: u64) -> String {
        format!("OFFSET {offset} ROWS FETCH NEXT {size} ROWS ONLY")
    }

    fn last_insert_id(&self) -> &'static str {
        "SELECT CAST(SCOPE_IDENTITY() AS BIGINT)"
    }
}

/// SQLite: `LIMIT .. OFFSET` paging and `last_insert_rowid()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn paging_clause(&self, offset: u64, size: u64) -> String {
        format!("LIMIT {size} OFFSET {offset}")
    }

    fn last_insert_id(&self) -> &'static str {
        "SELECT last_insert_rowid()"
    }
}

/// Built-in dialect selector, used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialectKind {
    /// [`SqlServer`].
    #[default]
    SqlServer,
    /// [`Sqlite`].
    Sqlite,
}

impl DialectKind {
    /// The dialect implementation.
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::SqlServer => &SqlServer,
            Self::Sqlite => &Sqlite,
        }
    }
}
