//! # entimap Core
//!
//! Entity mapping and statement generation over the entimap driver.
//!
//! This crate provides:
//! - Entity metadata ([`EntityDescriptor`], [`Catalog`]) and the
//!   [`MetadataOracle`] that answers table, column and key questions
//! - A predicate AST and its translation to SQL fragments
//! - The [`QueryBuilder`] for SELECT, INSERT, UPDATE and DELETE statements
//! - Result mapping from forward-only readers back into entities
//! - [`DbContext`], which runs queries and flushes queued changes
//!
//! ## Example
//!
//! ```rust
//! use entimap_core::predicate::prop;
//! use entimap_core::query::SqlServer;
//! use entimap_core::{
//!     Catalog, ColumnDescriptor, ConventionOracle, EntityDescriptor, Projection, QueryBuilder,
//!     QueryOptions,
//! };
//!
//! let oracle = ConventionOracle::new(Catalog::new().with_descriptor(
//!     EntityDescriptor::new("Customer")
//!         .column(ColumnDescriptor::new("Id").identity())
//!         .column(ColumnDescriptor::new("Name")),
//! ));
//! let statement = QueryBuilder::new(&oracle, &SqlServer)
//!     .build_select(
//!         "Customer",
//!         &QueryOptions::new().filter(prop("Name").contains("an")),
//!         &Projection::Entity,
//!     )
//!     .unwrap();
//!
//! assert_eq!(
//!     statement.sql,
//!     "SELECT [T1].[Id] AS [Id], [T1].[Name] AS [Name] FROM [Customer] AS [T1] \
//!      WHERE [T1].[Name] LIKE @Name ORDER BY [T1].[Id] ASC"
//! );
//! ```
//!
//! ## Features
//!
//! - `async`: tokio-based `*_async` wrappers on [`DbContext`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod mapper;
pub mod metadata;
pub mod predicate;
pub mod query;

pub use config::ContextConfig;
pub use context::{
    CancellationToken, DbContext, Operation, Page, PendingChange, SchemaError, SchemaValidator,
    Tracked,
};
pub use error::{CoreError, CoreResult};
pub use mapper::MappedRows;
pub use metadata::{
    Cardinality, Catalog, ColumnDescriptor, ConventionOracle, Entity, EntityDescriptor,
    MetadataOracle, NavigationDescriptor, Record,
};
pub use predicate::{prop, Predicate, PropertyRef};
pub use query::{DialectKind, Projection, QueryBuilder, QueryOptions, SelectStatement, SortDirection};
