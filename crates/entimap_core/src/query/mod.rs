//! Statement compilation.
//!
//! A [`QueryBuilder`] combines the [`MetadataOracle`], a [`Dialect`] and
//! per-call [`QueryOptions`] into SQL text plus parameters. SELECTs also
//! return their [`AliasTable`] and [`NavigationLink`]s so the result mapper
//! knows which reader column belongs to which entity.

mod alias;
mod dialect;
mod mutation;
mod options;
mod select;

pub use alias::{AliasTable, ColumnSlot, TableSlot};
pub use dialect::{Dialect, DialectKind, SqlServer, Sqlite};
pub use options::{QueryOptions, SortDirection, SortKey};
pub use select::{NavigationLink, Projection, SelectStatement};

use crate::metadata::MetadataOracle;

/// Compiles statements for one oracle and dialect.
#[derive(Clone, Copy)]
pub struct QueryBuilder<'a> {
    pub(crate) oracle: &'a dyn MetadataOracle,
    pub(crate) dialect: &'a dyn Dialect,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub fn new(oracle: &'a dyn MetadataOracle, dialect: &'a dyn Dialect) -> Self {
        Self { oracle, dialect }
    }

    /// The dialect statements are compiled for.
    #[must_use]
    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }
}

impl std::fmt::Debug for QueryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}
