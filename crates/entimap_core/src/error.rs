//! Error types for entimap core.

use crate::context::SchemaError;
use entimap_codec::CodecError;
use entimap_driver::DriverError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in entimap core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Connection or command failure.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// The predicate contains a node the translator cannot render.
    #[error("unsupported expression: {operator}")]
    UnsupportedExpression {
        /// The offending operator or method.
        operator: String,
    },

    /// A keyed statement was requested for an entity without a primary key.
    #[error("entity {entity} declares no primary key")]
    MissingPrimaryKey {
        /// Entity name.
        entity: String,
    },

    /// A property is not mapped on the entity.
    #[error("entity {entity} has no mapped property {property}")]
    UnknownProperty {
        /// Entity name.
        entity: String,
        /// Property name.
        property: String,
    },

    /// The entity is not known to the metadata oracle.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// Entity name.
        name: String,
    },

    /// A reader value could not be converted to the property type.
    #[error("cannot convert column {column} to {target}: {source}")]
    TypeConversion {
        /// Reader column (or navigation) being mapped.
        column: String,
        /// Target Rust type.
        target: String,
        /// Underlying conversion failure.
        source: CodecError,
    },

    /// An added entity already exists in the database.
    #[error("entity {entity} with key {key} already exists")]
    EntityAlreadyTracked {
        /// Entity name.
        entity: String,
        /// Primary-key values joined with `:`.
        key: String,
    },

    /// A modified or removed entity does not exist in the database.
    #[error("entity {entity} with key {key} was not found")]
    EntityNotFound {
        /// Entity name.
        entity: String,
        /// Primary-key values joined with `:`.
        key: String,
    },

    /// Schema validation failed for an entity type.
    #[error("schema validation failed for {entity}: {source}")]
    Schema {
        /// Entity name.
        entity: String,
        /// Error reported by the validator.
        source: SchemaError,
    },

    /// Page indexes start at 1.
    #[error("invalid page index {page_index}: pages start at 1")]
    InvalidPage {
        /// The rejected index.
        page_index: u32,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Creates an unsupported expression error.
    pub fn unsupported(operator: impl Into<String>) -> Self {
        Self::UnsupportedExpression {
            operator: operator.into(),
        }
    }

    /// Creates a missing primary key error.
    pub fn missing_primary_key(entity: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            entity: entity.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Creates an unknown entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }

    /// Wraps a codec failure with the column being mapped.
    pub fn conversion(column: impl Into<String>, source: CodecError) -> Self {
        Self::TypeConversion {
            column: column.into(),
            target: source.target().to_string(),
            source,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
