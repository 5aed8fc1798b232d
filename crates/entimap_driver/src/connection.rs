//! Connection abstraction.

use crate::command::Command;
use crate::error::DriverResult;
use crate::row::RowSet;
use entimap_codec::Value;

/// A database connection.
///
/// Implementations are **command executors**: they run SQL text with named
/// parameters and know nothing about entities. A connection must be opened
/// before any command runs; closing an already-closed connection is a no-op.
///
/// # Thread Safety
///
/// Connections are `Send` so a context can move between threads, but a
/// single connection is used by one caller at a time.
pub trait Connection: Send {
    /// Opens the connection.
    fn open(&mut self) -> DriverResult<()>;

    /// Closes the connection. Closing a closed connection succeeds.
    fn close(&mut self) -> DriverResult<()>;

    /// Returns true while the connection is open.
    fn is_open(&self) -> bool;

    /// Runs a non-query command and returns the affected-row count.
    fn execute(&mut self, command: &Command) -> DriverResult<u64>;

    /// Runs a query and returns a forward-only reader over its rows.
    fn query(&mut self, command: &Command) -> DriverResult<RowSet<'_>>;

    /// Runs a query and returns the first column of the first row.
    ///
    /// The default implementation reads through [`query`](Self::query).
    fn scalar(&mut self, command: &Command) -> DriverResult<Option<Value>> {
        let mut rows = self.query(command)?;
        match rows.next() {
            Some(row) => Ok(row?.into_values().into_iter().next()),
            None => Ok(None),
        }
    }

    /// Starts a transaction on this connection.
    fn begin_transaction(&mut self) -> DriverResult<()>;

    /// Commits the active transaction.
    fn commit(&mut self) -> DriverResult<()>;

    /// Rolls back the active transaction.
    fn rollback(&mut self) -> DriverResult<()>;

    /// Returns true while a transaction is active.
    fn in_transaction(&self) -> bool;
}

/// Produces new, unopened connections.
///
/// A context that owns its connections asks the factory for one per
/// operation (or one per transaction).
pub trait ConnectionFactory: Send + Sync {
    /// Creates a new connection. The connection is not yet open.
    fn connect(&self) -> DriverResult<Box<dyn Connection>>;
}

impl<F> ConnectionFactory for F
where
    F: Fn() -> DriverResult<Box<dyn Connection>> + Send + Sync,
{
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        self()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn open(&mut self) -> DriverResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> DriverResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn execute(&mut self, command: &Command) -> DriverResult<u64> {
        (**self).execute(command)
    }

    fn query(&mut self, command: &Command) -> DriverResult<RowSet<'_>> {
        (**self).query(command)
    }

    fn scalar(&mut self, command: &Command) -> DriverResult<Option<Value>> {
        (**self).scalar(command)
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> DriverResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> DriverResult<()> {
        (**self).rollback()
    }

    fn in_transaction(&self) -> bool {
        (**self).in_transaction()
    }
}
