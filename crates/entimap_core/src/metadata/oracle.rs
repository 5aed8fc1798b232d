//! The metadata oracle: table, column and key facts per entity type.

use super::catalog::Catalog;
use super::descriptor::{EntityDescriptor, NavigationDescriptor};
use crate::error::{CoreError, CoreResult};

/// Answers mapping questions about entity types.
///
/// Implementations are pure lookups: no I/O and no side effects. Entity
/// types are identified by name.
pub trait MetadataOracle {
    /// Full descriptor of an entity.
    fn descriptor(&self, entity: &str) -> CoreResult<&EntityDescriptor>;

    /// Table name of an entity.
    fn table_name(&self, entity: &str) -> CoreResult<&str> {
        Ok(self.descriptor(entity)?.table_name())
    }

    /// Mapped columns as `(column, property)` pairs, in declaration order.
    fn mapped_columns(&self, entity: &str) -> CoreResult<Vec<(&str, &str)>> {
        Ok(self
            .descriptor(entity)?
            .columns
            .iter()
            .map(|c| (c.column_name(), c.property.as_str()))
            .collect())
    }

    /// Primary-key properties, in declaration order. Empty for keyless types.
    fn primary_key_properties(&self, entity: &str) -> CoreResult<Vec<&str>>;

    /// Whether a property is a database-assigned identity column.
    fn is_identity_column(&self, entity: &str, property: &str) -> CoreResult<bool>;

    /// The property on `related` that points back at `owner`, if any.
    fn foreign_key_property(&self, related: &str, owner: &str) -> CoreResult<Option<&str>>;

    /// Navigation properties of an entity.
    fn navigations(&self, entity: &str) -> CoreResult<&[NavigationDescriptor]> {
        Ok(&self.descriptor(entity)?.navigations)
    }

    /// Column name of a property.
    fn column_name(&self, entity: &str, property: &str) -> CoreResult<&str> {
        self.descriptor(entity)?
            .column_by_property(property)
            .map(|c| c.column_name())
            .ok_or_else(|| CoreError::unknown_property(entity, property))
    }
}

/// A [`MetadataOracle`] over a [`Catalog`] that fills gaps by convention.
///
/// - Primary key: columns flagged `primary_key`, else a property named
///   `Id`, else `<Entity>Id`.
/// - Identity: columns flagged `identity`.
/// - Foreign key of `related` to `owner`: a column whose `references` names
///   the owner, else a property named `<Owner>Id`.
#[derive(Debug, Clone, Default)]
pub struct ConventionOracle {
    catalog: Catalog,
}

impl ConventionOracle {
    /// Creates an oracle over a catalog.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl MetadataOracle for ConventionOracle {
    fn descriptor(&self, entity: &str) -> CoreResult<&EntityDescriptor> {
        self.catalog
            .get(entity)
            .ok_or_else(|| CoreError::unknown_entity(entity))
    }

    fn primary_key_properties(&self, entity: &str) -> CoreResult<Vec<&str>> {
        let descriptor = self.descriptor(entity)?;
        let flagged: Vec<&str> = descriptor
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.property.as_str())
            .collect();
        if !flagged.is_empty() {
            return Ok(flagged);
        }
        let by_convention = descriptor
            .column_by_property("Id")
            .or_else(|| descriptor.column_by_property(&format!("{}Id", descriptor.name)));
        Ok(by_convention
            .map(|c| vec![c.property.as_str()])
            .unwrap_or_default())
    }

    fn is_identity_column(&self, entity: &str, property: &str) -> CoreResult<bool> {
        let descriptor = self.descriptor(entity)?;
        descriptor
            .column_by_property(property)
            .map(|c| c.identity)
            .ok_or_else(|| CoreError::unknown_property(entity, property))
    }

    fn foreign_key_property(&self, related: &str, owner: &str) -> CoreResult<Option<&str>> {
        let descriptor = self.descriptor(related)?;
        let explicit = descriptor
            .columns
            .iter()
            .find(|c| c.references.as_deref() == Some(owner));
        let column = explicit.or_else(|| descriptor.column_by_property(&format!("{owner}Id")));
        Ok(column.map(|c| c.property.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, NavigationDescriptor};

    fn oracle() -> ConventionOracle {
        ConventionOracle::new(
            Catalog::new()
                .with_descriptor(
                    EntityDescriptor::new("Customer")
                        .column(ColumnDescriptor::new("Id").identity())
                        .column(ColumnDescriptor::new("Name"))
                        .navigation(NavigationDescriptor::many("Orders", "Order")),
                )
                .with_descriptor(
                    EntityDescriptor::new("Order")
                        .column(ColumnDescriptor::new("OrderId"))
                        .column(ColumnDescriptor::new("CustomerId")),
                )
                .with_descriptor(
                    EntityDescriptor::new("Invoice")
                        .column(ColumnDescriptor::new("Number"))
                        .column(ColumnDescriptor::new("Buyer").references("Customer")),
                )
                .with_descriptor(
                    EntityDescriptor::new("Log").column(ColumnDescriptor::new("Message")),
                ),
        )
    }

    #[test]
    fn primary_key_conventions() {
        let oracle = oracle();
        assert_eq!(oracle.primary_key_properties("Customer").unwrap(), vec!["Id"]);
        assert_eq!(oracle.primary_key_properties("Order").unwrap(), vec!["OrderId"]);
        assert!(oracle.primary_key_properties("Log").unwrap().is_empty());
    }

    #[test]
    fn foreign_key_prefers_explicit_reference() {
        let oracle = oracle();
        assert_eq!(
            oracle.foreign_key_property("Order", "Customer").unwrap(),
            Some("CustomerId")
        );
        assert_eq!(
            oracle.foreign_key_property("Invoice", "Customer").unwrap(),
            Some("Buyer")
        );
        assert_eq!(oracle.foreign_key_property("Log", "Customer").unwrap(), None);
    }

    #[test]
    fn unknown_lookups_fail() {
        let oracle = oracle();
        assert!(matches!(
            oracle.table_name("Nope"),
            Err(CoreError::UnknownEntity { .. })
        ));
        assert!(matches!(
            oracle.is_identity_column("Customer", "Nope"),
            Err(CoreError::UnknownProperty { .. })
        ));
        assert!(oracle.is_identity_column("Customer", "Id").unwrap());
        assert_eq!(oracle.navigations("Customer").unwrap().len(), 1);
        assert_eq!(
            oracle.mapped_columns("Order").unwrap(),
            vec![("OrderId", "OrderId"), ("CustomerId", "CustomerId")]
        );
    }
}
