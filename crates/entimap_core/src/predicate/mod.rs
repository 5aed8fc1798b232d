//! Boolean predicates over entity properties and their SQL translation.
//!
//! Predicates are built with the fluent helpers on [`PropertyRef`]:
//!
//! ```rust
//! use entimap_core::predicate::{prop, Predicate};
//!
//! let filter: Predicate = prop("Name").contains("an").and(prop("Id").gt(2));
//! ```

mod ast;
mod translate;

pub use ast::{prop, CompareOp, MethodKind, Operand, Predicate, PropertyRef};
pub(crate) use translate::ParameterNamer;
pub use translate::{translate, AliasResolver, ResolvedColumn, Translation};
