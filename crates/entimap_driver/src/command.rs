//! Parameterized commands.

use entimap_codec::Value;
use std::fmt;

/// Named parameters bound to a command, in first-bound order.
///
/// Names include the `@` prefix exactly as the token appears in SQL text.
/// Binding a name twice replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, Value)>,
}

impl Parameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value to a name.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`bind`](Self::bind).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    /// Looks up a bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns true if the name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Appends every binding of `other`, replacing same-named values.
    pub fn extend(&mut self, other: &Parameters) {
        for (name, value) in &other.entries {
            self.bind(name.clone(), value.clone());
        }
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Iterates over parameter names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

/// A SQL command with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// SQL text.
    pub sql: String,
    /// Bound parameters.
    pub parameters: Parameters,
}

impl Command {
    /// Creates a command without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Parameters::new(),
        }
    }

    /// Creates a command with parameters.
    pub fn with_parameters(sql: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            let sep = if i == 0 { " -- " } else { ", " };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_replaces_value_in_place() {
        let mut params = Parameters::new();
        params.bind("@Id", 1);
        params.bind("@Name", "Ann");
        params.bind("@Id", 2);

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("@Id"), Some(&Value::Integer(2)));
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["@Id", "@Name"]);
    }

    #[test]
    fn display_appends_parameters() {
        let cmd = Command::with_parameters(
            "SELECT 1 WHERE [Id] = @Id",
            Parameters::new().with("@Id", 5),
        );
        assert_eq!(cmd.to_string(), "SELECT 1 WHERE [Id] = @Id -- @Id=5");
    }
}
