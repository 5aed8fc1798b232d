//! Entity metadata.
//!
//! Descriptors are plain data registered once per type; the
//! [`MetadataOracle`] answers table, column and key questions over them.

mod catalog;
mod descriptor;
mod entity;
mod oracle;

pub use catalog::Catalog;
pub use descriptor::{Cardinality, ColumnDescriptor, EntityDescriptor, NavigationDescriptor};
pub use entity::{Entity, Record};
pub use oracle::{ConventionOracle, MetadataOracle};
