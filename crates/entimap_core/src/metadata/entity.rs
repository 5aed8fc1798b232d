//! Typed entities and dynamic records.

use super::descriptor::EntityDescriptor;
use entimap_codec::{CodecResult, Value};

/// A property bag keyed by property name.
///
/// Records carry joined-entity data to [`Entity::attach`] and entity state
/// into the statement builders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entity: String,
    values: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record for `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: Vec::new(),
        }
    }

    /// Entity name the record belongs to.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Sets a property, replacing an earlier value.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        let property = property.into();
        let value = value.into();
        match self.values.iter_mut().find(|(p, _)| *p == property) {
            Some(slot) => slot.1 = value,
            None => self.values.push((property, value)),
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    /// Value of a property.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
    }

    /// Value of a property, `Null` when absent.
    #[must_use]
    pub fn value(&self, property: &str) -> Value {
        self.get(property).cloned().unwrap_or(Value::Null)
    }

    /// Iterates over `(property, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(p, v)| (p.as_str(), v))
    }

    /// Returns true if no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A typed record mapped to one table row.
///
/// Implementations expose their mapped properties by name. Unknown
/// property names are ignored by [`set`](Self::set) and
/// [`attach`](Self::attach) so partially matching readers map cleanly.
///
/// # Example
///
/// ```rust
/// use entimap_codec::{CodecResult, FromValue, Value};
/// use entimap_core::{ColumnDescriptor, Entity, EntityDescriptor};
/// use std::sync::OnceLock;
///
/// #[derive(Debug, Default)]
/// struct Tag {
///     name: String,
/// }
///
/// impl Entity for Tag {
///     fn descriptor() -> &'static EntityDescriptor {
///         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
///         DESCRIPTOR.get_or_init(|| {
///             EntityDescriptor::new("Tag").column(ColumnDescriptor::new("Name").primary_key())
///         })
///     }
///
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "Name" => Some(Value::from(self.name.as_str())),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
///         if property == "Name" {
///             self.name = String::from_value(value)?;
///         }
///         Ok(())
///     }
/// }
///
/// let tag = Tag::from_record(&entimap_core::Record::new("Tag").with("Name", "red")).unwrap();
/// assert_eq!(tag.name, "red");
/// ```
pub trait Entity: Default + Send + 'static {
    /// The entity's descriptor.
    fn descriptor() -> &'static EntityDescriptor;

    /// Reads a mapped property.
    fn get(&self, property: &str) -> Option<Value>;

    /// Writes a mapped property.
    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()>;

    /// Wires a joined related entity into a navigation property.
    ///
    /// Collection navigations append; singular navigations are attached
    /// once. The default drops the record, so an entity that eager-loads
    /// navigations must override it.
    fn attach(&mut self, navigation: &str, related: &Record) -> CodecResult<()> {
        tracing::debug!(
            owner = %Self::descriptor().name,
            navigation,
            related = related.entity(),
            "no attach for navigation, joined record dropped"
        );
        Ok(())
    }

    /// Builds an entity from a record.
    fn from_record(record: &Record) -> CodecResult<Self> {
        let mut entity = Self::default();
        for (property, value) in record.iter() {
            if !value.is_null() {
                entity.set(property, value)?;
            }
        }
        Ok(entity)
    }

    /// Snapshots every mapped column into a record.
    fn to_record(&self) -> Record {
        let descriptor = Self::descriptor();
        let mut record = Record::new(descriptor.name.clone());
        for column in &descriptor.columns {
            record.set(
                column.property.clone(),
                self.get(&column.property).unwrap_or(Value::Null),
            );
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_set_replaces_in_place() {
        let mut record = Record::new("Customer").with("Id", 1).with("Name", "Ann");
        record.set("Id", 2);

        assert_eq!(record.entity(), "Customer");
        assert_eq!(record.get("Id"), Some(&Value::Integer(2)));
        assert_eq!(record.value("Missing"), Value::Null);
        assert_eq!(
            record.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            vec!["Id", "Name"]
        );
    }
}
