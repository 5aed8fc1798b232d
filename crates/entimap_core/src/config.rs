//! Context configuration.

use crate::query::DialectKind;

/// Configuration for a [`DbContext`](crate::DbContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// SQL dialect used for paging and identity retrieval.
    pub dialect: DialectKind,

    /// Whether the schema validator is consulted before an entity type is
    /// first used.
    pub validate_schema: bool,

    /// Whether flush checks for existing rows before each change.
    pub check_existence: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::SqlServer,
            validate_schema: true,
            check_existence: true,
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the SQL dialect.
    #[must_use]
    pub const fn dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets whether schema validation runs.
    #[must_use]
    pub const fn validate_schema(mut self, value: bool) -> Self {
        self.validate_schema = value;
        self
    }

    /// Sets whether flush checks for existing rows.
    #[must_use]
    pub const fn check_existence(mut self, value: bool) -> Self {
        self.check_existence = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.dialect, DialectKind::SqlServer);
        assert!(config.validate_schema);
        assert!(config.check_existence);
    }

    #[test]
    fn builder_pattern() {
        let config = ContextConfig::new()
            .dialect(DialectKind::Sqlite)
            .validate_schema(false)
            .check_existence(false);

        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert!(!config.validate_schema);
        assert!(!config.check_existence);
    }
}
