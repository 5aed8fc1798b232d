//! Descriptor registry.

use super::descriptor::EntityDescriptor;
use super::entity::Entity;
use std::collections::HashMap;

/// A registry of entity descriptors keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: Vec<EntityDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed entity.
    #[must_use]
    pub fn with<T: Entity>(self) -> Self {
        self.with_descriptor(T::descriptor().clone())
    }

    /// Registers a descriptor, replacing one with the same name.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: EntityDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Registers a descriptor, replacing one with the same name.
    pub fn register(&mut self, descriptor: EntityDescriptor) {
        match self.by_name.get(&descriptor.name) {
            Some(&index) => self.entities[index] = descriptor,
            None => {
                self.by_name
                    .insert(descriptor.name.clone(), self.entities.len());
                self.entities.push(descriptor);
            }
        }
    }

    /// Looks up a descriptor by entity name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    /// Returns true if the entity is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterates over descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<EntityDescriptor> for Catalog {
    fn from_iter<I: IntoIterator<Item = EntityDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.register(descriptor);
        }
        catalog
    }
}
