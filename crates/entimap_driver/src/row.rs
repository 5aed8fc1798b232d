//! Rows and forward-only readers.

use crate::error::DriverResult;
use entimap_codec::Value;
use std::fmt;
use std::sync::Arc;

/// One row from a reader.
///
/// Column names are shared between all rows of a reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. Missing trailing values read as `Null`.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Name of the column at `index`.
    #[must_use]
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// Value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        if index < self.columns.len() {
            Some(self.values.get(index).unwrap_or(&Value::Null))
        } else {
            None
        }
    }

    /// Ordinal of a column: exact match first, then ASCII case-insensitive.
    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// Value of a named column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ordinal(name).and_then(|i| self.value(i))
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), self.values.get(i).unwrap_or(&Value::Null)))
    }

    /// Consumes the row into its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A forward-only row reader.
///
/// The reader borrows the connection that produced it; it can be consumed
/// once and cannot be restarted.
pub struct RowSet<'c> {
    columns: Arc<[String]>,
    rows: Box<dyn Iterator<Item = DriverResult<Vec<Value>>> + 'c>,
}

impl<'c> RowSet<'c> {
    /// Creates a reader over a stream of raw value rows.
    pub fn new<I>(columns: Vec<String>, rows: I) -> Self
    where
        I: Iterator<Item = DriverResult<Vec<Value>>> + 'c,
    {
        Self {
            columns: columns.into(),
            rows: Box::new(rows),
        }
    }

    /// Creates a reader with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), std::iter::empty())
    }

    /// Column names reported by the reader.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl RowSet<'static> {
    /// Creates a reader over materialized rows.
    #[must_use]
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self::new(columns, rows.into_iter().map(Ok))
    }
}

impl Iterator for RowSet<'_> {
    type Item = DriverResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let columns = Arc::clone(&self.columns);
        self.rows
            .next()
            .map(|values| values.map(|values| Row::new(columns, values)))
    }
}

impl fmt::Debug for RowSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSet")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn lookup_prefers_exact_then_case_insensitive() {
        let mut rows = RowSet::from_rows(
            columns(&["Id", "name", "Name"]),
            vec![vec![Value::Integer(1), Value::from("lower"), Value::from("upper")]],
        );
        let row = rows.next().unwrap().unwrap();

        assert_eq!(row.get("Name"), Some(&Value::from("upper")));
        assert_eq!(row.get("NAME"), Some(&Value::from("lower")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn short_rows_read_null() {
        let mut rows = RowSet::from_rows(columns(&["A", "B"]), vec![vec![Value::Integer(1)]]);
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.value(1), Some(&Value::Null));
        assert_eq!(row.value(2), None);
    }

    #[test]
    fn reader_is_forward_only() {
        let mut rows = RowSet::from_rows(
            columns(&["A"]),
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        );
        assert_eq!(rows.columns(), &["A".to_string()]);
        assert!(rows.next().is_some());
        assert!(rows.next().is_some());
        assert!(rows.next().is_none());
    }
}
