//! Statically registered entity descriptors.

use serde::{Deserialize, Serialize};

/// A mapped primitive column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Property name on the entity.
    pub property: String,

    /// Column name in the table. Empty means "same as the property".
    #[serde(default)]
    pub column: String,

    /// Whether the column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,

    /// Whether the database assigns the value on insert.
    #[serde(default)]
    pub identity: bool,

    /// Entity this column refers to, if it is a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl ColumnDescriptor {
    /// Creates a column whose name equals the property name.
    pub fn new(property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            column: property.clone(),
            property,
            primary_key: false,
            identity: false,
            references: None,
        }
    }

    /// Overrides the column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as a database-assigned identity key.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.primary_key = true;
        self.identity = true;
        self
    }

    /// Marks the column as a foreign key to `entity`.
    #[must_use]
    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.references = Some(entity.into());
        self
    }

    /// Column name, falling back to the property name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        if self.column.is_empty() {
            &self.property
        } else {
            &self.column
        }
    }
}

/// Whether a navigation holds one related entity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Singular reference.
    One,
    /// Collection.
    Many,
}

/// A navigation property to a related entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationDescriptor {
    /// Property name on the owner.
    pub property: String,
    /// Related entity name.
    pub target: String,
    /// One or many.
    pub cardinality: Cardinality,
}

impl NavigationDescriptor {
    /// A singular reference navigation.
    pub fn one(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            target: target.into(),
            cardinality: Cardinality::One,
        }
    }

    /// A collection navigation.
    pub fn many(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
        }
    }
}

/// Everything the engine knows about an entity type.
///
/// Columns are kept in declaration order, which is the order they are
/// selected and inserted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Entity name (usually the Rust type name).
    pub name: String,

    /// Table name. Empty means "same as the entity name".
    #[serde(default)]
    pub table: String,

    /// Mapped primitive columns.
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,

    /// Navigation properties.
    #[serde(default)]
    pub navigations: Vec<NavigationDescriptor>,
}

impl EntityDescriptor {
    /// Creates a descriptor whose table name equals the entity name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            columns: Vec::new(),
            navigations: Vec::new(),
        }
    }

    /// Overrides the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a navigation property.
    #[must_use]
    pub fn navigation(mut self, navigation: NavigationDescriptor) -> Self {
        self.navigations.push(navigation);
        self
    }

    /// Table name, falling back to the entity name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        if self.table.is_empty() {
            &self.name
        } else {
            &self.table
        }
    }

    /// Finds a column by property name.
    #[must_use]
    pub fn column_by_property(&self, property: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Finds a column by column name (ASCII case-insensitive).
    #[must_use]
    pub fn column_by_name(&self, column: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.column_name().eq_ignore_ascii_case(column))
    }

    /// Finds a navigation by property name.
    #[must_use]
    pub fn navigation_by_property(&self, property: &str) -> Option<&NavigationDescriptor> {
        self.navigations.iter().find(|n| n.property == property)
    }
}
