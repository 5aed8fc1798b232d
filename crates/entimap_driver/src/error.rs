//! Error types for the driver crate.

use std::io;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that can occur in connection operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The connection must be opened before use.
    #[error("connection is not open")]
    NotOpen,

    /// The connection was already open.
    #[error("connection is already open")]
    AlreadyOpen,

    /// The database rejected a command.
    #[error("command failed: {message}")]
    Command {
        /// Message reported by the database.
        message: String,
    },

    /// Transaction state does not allow the requested operation.
    #[error("transaction error: {message}")]
    Transaction {
        /// Description of the problem.
        message: String,
    },

    /// A strict scripted driver received a command nobody scripted.
    #[error("no scripted response for: {sql}")]
    Unscripted {
        /// The SQL text that was sent.
        sql: String,
    },

    /// Underlying transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// Creates a command failure.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a transaction state error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }
}
