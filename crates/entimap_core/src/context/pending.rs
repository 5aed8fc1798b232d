//! Pending entity changes.

use crate::metadata::{Entity, Record};
use entimap_codec::{CodecResult, Value};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// The mutation a pending change applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// INSERT; the row must not exist yet.
    Added,
    /// UPDATE; the row must exist.
    Modified,
    /// DELETE; the row must exist.
    Removed,
}

/// A shared handle to an entity queued for flush.
///
/// Flush writes database-assigned identity values back through the handle,
/// so callers observe them after a successful flush.
pub struct Tracked<T>(Arc<Mutex<T>>);

impl<T> Tracked<T> {
    /// Wraps an entity.
    pub fn new(entity: T) -> Self {
        Self(Arc::new(Mutex::new(entity)))
    }

    /// Locks the entity for reading or editing.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    /// A copy of the current entity state.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.lock().clone()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&*self.0.lock()).finish()
    }
}

/// Type-erased access to a queued entity.
pub(crate) trait PendingEntity: Send {
    fn entity_name(&self) -> &'static str;
    fn record(&self) -> Record;
    fn write_back(&self, property: &str, value: &Value) -> CodecResult<()>;
}

impl<T: Entity> PendingEntity for Tracked<T> {
    fn entity_name(&self) -> &'static str {
        T::descriptor().name.as_str()
    }

    fn record(&self) -> Record {
        self.0.lock().to_record()
    }

    fn write_back(&self, property: &str, value: &Value) -> CodecResult<()> {
        self.0.lock().set(property, value)
    }
}

/// One queued mutation.
pub struct PendingChange {
    pub(crate) entity: Box<dyn PendingEntity>,
    pub(crate) operation: Operation,
}

impl PendingChange {
    pub(crate) fn new<T: Entity>(entity: Tracked<T>, operation: Operation) -> Self {
        Self {
            entity: Box::new(entity),
            operation,
        }
    }

    /// Name of the entity type.
    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.entity.entity_name()
    }

    /// The queued operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl fmt::Debug for PendingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingChange")
            .field("entity", &self.entity_name())
            .field("operation", &self.operation)
            .finish()
    }
}
