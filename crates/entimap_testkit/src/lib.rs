//! # entimap Testkit
//!
//! Test utilities for entimap.
//!
//! This crate provides:
//! - Fixture entities (`Customer`, `Order`, `Address`, `Tag`, `AuditEntry`)
//!   and their catalog
//! - Scripted-database helpers that produce reader rows in the column
//!   layout the query builder selects
//! - An in-memory customer table that filters and pages from the SQL it runs
//! - Property-based generators for predicates
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use entimap_core::QueryOptions;
//! use entimap_testkit::prelude::*;
//!
//! let db = MemoryDatabase::new();
//! script_customers(&db, &[(1, "Ann"), (2, "Ben")]);
//!
//! let customers: Vec<Customer> = context(&db)
//!     .find_many(&QueryOptions::new().without_eager_load())
//!     .unwrap();
//! assert_eq!(customers.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod table;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::table::*;
    pub use entimap_driver::MemoryDatabase;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use table::*;
