//! Per-statement alias bookkeeping.
//!
//! The table is an arena: tables and columns live in vectors and refer to
//! each other by index, so "table -> columns" and "column -> table" lookups
//! need no back-references.

use std::collections::{HashMap, HashSet};

/// A table taking part in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSlot {
    /// Table name.
    pub table: String,
    /// Alias (`T1`, `T2`, ...).
    pub alias: String,
    /// Entity mapped to the table.
    pub entity: String,
}

/// A selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    /// Index of the owning table.
    pub table: usize,
    /// Column name.
    pub column: String,
    /// Property the column maps to.
    pub property: String,
    /// Alias the column is selected as.
    pub alias: String,
}

/// Aliases allocated for one statement.
///
/// Table aliases are `T<n>`; column aliases are the column name, suffixed
/// on collision (`Name`, `Name1`, `Name2`, ...) in the order columns are
/// first requested. All aliases are unique within the statement, compared
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    tables: Vec<TableSlot>,
    columns: Vec<ColumnSlot>,
    table_by_name: HashMap<String, usize>,
    column_by_alias: HashMap<String, usize>,
    taken_tables: HashSet<String>,
    taken_columns: HashSet<String>,
}

impl AliasTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, returning its index. A table registered twice
    /// keeps its first alias.
    pub fn add_table(&mut self, table: &str, entity: &str) -> usize {
        if let Some(&index) = self.table_by_name.get(table) {
            return index;
        }
        let alias = self.reserve_table_alias();
        let index = self.tables.len();
        self.tables.push(TableSlot {
            table: table.to_string(),
            alias,
            entity: entity.to_string(),
        });
        self.table_by_name.insert(table.to_string(), index);
        index
    }

    /// Registers a column of a table, returning its index.
    pub fn add_column(&mut self, table: usize, column: &str, property: &str) -> usize {
        if let Some(index) = self.column_index(table, column) {
            return index;
        }
        let alias = self.reserve_column_alias_from(column, false);
        let index = self.columns.len();
        self.columns.push(ColumnSlot {
            table,
            column: column.to_string(),
            property: property.to_string(),
            alias: alias.clone(),
        });
        self.column_by_alias.insert(alias, index);
        index
    }

    /// Reserves the next free `T<n>` alias without registering a table.
    pub fn reserve_table_alias(&mut self) -> String {
        let mut n = self.taken_tables.len() + 1;
        loop {
            let candidate = format!("T{n}");
            if self.taken_tables.insert(candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Reserves a column alias `<prefix><n>` for the first free `n >= 1`.
    pub fn reserve_column_alias(&mut self, prefix: &str) -> String {
        self.reserve_column_alias_from(prefix, true)
    }

    fn reserve_column_alias_from(&mut self, base: &str, always_suffix: bool) -> String {
        if !always_suffix && self.taken_columns.insert(base.to_ascii_lowercase()) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}{n}");
            if self.taken_columns.insert(candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Table at `index`.
    #[must_use]
    pub fn table(&self, index: usize) -> Option<&TableSlot> {
        self.tables.get(index)
    }

    /// All tables, in registration order.
    #[must_use]
    pub fn tables(&self) -> &[TableSlot] {
        &self.tables
    }

    /// All columns, in registration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSlot] {
        &self.columns
    }

    /// Columns of one table.
    pub fn columns_of(&self, table: usize) -> impl Iterator<Item = &ColumnSlot> {
        self.columns.iter().filter(move |c| c.table == table)
    }

    /// Index of a table by name.
    #[must_use]
    pub fn table_index(&self, table: &str) -> Option<usize> {
        self.table_by_name.get(table).copied()
    }

    /// Index of a table by alias.
    #[must_use]
    pub fn table_index_by_alias(&self, alias: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.alias == alias)
    }

    /// Index of the first table mapped to `entity`.
    #[must_use]
    pub fn table_index_by_entity(&self, entity: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.entity == entity)
    }

    /// Index of a table's column.
    #[must_use]
    pub fn column_index(&self, table: usize, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.table == table && c.column == column)
    }

    /// Column selected under `alias`.
    #[must_use]
    pub fn column_by_alias(&self, alias: &str) -> Option<&ColumnSlot> {
        self.column_by_alias.get(alias).map(|&i| &self.columns[i])
    }

    /// Table owning the column selected under `alias`.
    #[must_use]
    pub fn table_of_column(&self, alias: &str) -> Option<&TableSlot> {
        self.column_by_alias(alias).and_then(|c| self.tables.get(c.table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_get_sequential_aliases_once() {
        let mut aliases = AliasTable::new();
        assert_eq!(aliases.add_table("Customer", "Customer"), 0);
        assert_eq!(aliases.add_table("Order", "Order"), 1);
        assert_eq!(aliases.add_table("Customer", "Customer"), 0);

        assert_eq!(aliases.table(0).map(|t| t.alias.as_str()), Some("T1"));
        assert_eq!(aliases.table(1).map(|t| t.alias.as_str()), Some("T2"));
        assert_eq!(aliases.table_index_by_alias("T2"), Some(1));
        assert_eq!(aliases.table_index_by_entity("Order"), Some(1));
        assert_eq!(aliases.reserve_table_alias(), "T3");
    }

    #[test]
    fn column_aliases_suffix_on_collision() {
        let mut aliases = AliasTable::new();
        let customer = aliases.add_table("Customer", "Customer");
        let order = aliases.add_table("Order", "Order");
        aliases.add_column(customer, "Id", "Id");
        aliases.add_column(customer, "Name", "Name");
        aliases.add_column(order, "Id", "Id");
        aliases.add_column(order, "Name", "Name");
        aliases.add_column(order, "id", "Legacy");

        let names: Vec<_> = aliases.columns().iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name", "Id1", "Name1", "id2"]);
        assert_eq!(aliases.table_of_column("Id1").map(|t| t.table.as_str()), Some("Order"));
        assert_eq!(aliases.columns_of(customer).count(), 2);
    }

    #[test]
    fn counter_aliases_avoid_existing_columns() {
        let mut aliases = AliasTable::new();
        let t = aliases.add_table("Stats", "Stats");
        aliases.add_column(t, "C1", "C1");
        aliases.add_column(t, "C2", "C2");

        assert_eq!(aliases.reserve_column_alias("C"), "C3");
        assert_eq!(aliases.reserve_column_alias("C"), "C4");
    }
}
