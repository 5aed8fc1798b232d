//! The database context: connections, queries and the change batch.

#[cfg(feature = "async")]
mod asynchronous;
mod cancel;
mod engine;
mod pending;
mod schema;

pub use cancel::CancellationToken;
pub use engine::{DbContext, Page};
pub use pending::{Operation, PendingChange, Tracked};
pub use schema::{SchemaError, SchemaValidator};
