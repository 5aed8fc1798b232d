//! # entimap Driver
//!
//! The low-level connection surface entimap executes against.
//!
//! This crate is the lowest layer of entimap. Connections are **opaque
//! command executors** - they receive SQL text plus named parameters and
//! hand back affected-row counts or forward-only row readers. They know
//! nothing about entities, aliases or dialects.
//!
//! ## Design Principles
//!
//! - A [`Connection`] is opened, used and closed by its owner
//! - Readers ([`RowSet`]) are forward-only and borrow their connection
//! - Parameters are named and carry the `@` prefix used in the SQL text
//! - Transactions are connection-scoped (`begin_transaction`/`commit`/`rollback`)
//!
//! ## Available Drivers
//!
//! - [`MemoryDatabase`] - Scripted in-process driver for tests and benches
//!
//! ## Example
//!
//! ```rust
//! use entimap_driver::{Command, Connection, ConnectionFactory, MemoryDatabase};
//! use entimap_codec::Value;
//!
//! let db = MemoryDatabase::new();
//! db.on_query("FROM [Customer]")
//!     .returns_rows(&["Id", "Name"], vec![vec![Value::Integer(1), Value::from("Ann")]]);
//!
//! let mut conn = db.connect().unwrap();
//! conn.open().unwrap();
//! let rows: Vec<_> = conn
//!     .query(&Command::new("SELECT [Id], [Name] FROM [Customer]"))
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].get("Name"), Some(&Value::from("Ann")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod connection;
mod error;
mod memory;
mod row;

pub use command::{Command, Parameters};
pub use connection::{Connection, ConnectionFactory};
pub use error::{DriverError, DriverResult};
pub use memory::{
    CommandKind, ConnectionEvent, LoggedCommand, MemoryConnection, MemoryDatabase, Script,
};
pub use row::{Row, RowSet};
