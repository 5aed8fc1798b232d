//! Lazy per-entity schema validation.

use crate::metadata::EntityDescriptor;
use entimap_driver::Connection;
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;

/// Failure reported by a [`SchemaValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaError {
    message: String,
}

impl SchemaError {
    /// Creates a schema error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Validates, and optionally creates, the table behind an entity.
///
/// Called at most once per entity per context, on the connection the
/// triggering operation runs on.
pub trait SchemaValidator: Send + Sync {
    /// Checks or creates the schema for `entity`.
    fn validate_or_create(
        &self,
        entity: &EntityDescriptor,
        connection: &mut dyn Connection,
    ) -> Result<(), SchemaError>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&EntityDescriptor, &mut dyn Connection) -> Result<(), SchemaError> + Send + Sync,
{
    fn validate_or_create(
        &self,
        entity: &EntityDescriptor,
        connection: &mut dyn Connection,
    ) -> Result<(), SchemaError> {
        self(entity, connection)
    }
}

/// Entities whose validation has been attempted.
///
/// An entity is marked before its validator runs, so a failing entity is
/// reported once and not retried.
#[derive(Debug, Default)]
pub(crate) struct SchemaCache {
    attempted: Mutex<HashSet<String>>,
}

impl SchemaCache {
    /// Marks `entity` attempted; returns true on the first call for it.
    pub(crate) fn first_attempt(&self, entity: &str) -> bool {
        self.attempted.lock().insert(entity.to_string())
    }

    pub(crate) fn len(&self) -> usize {
        self.attempted.lock().len()
    }
}
