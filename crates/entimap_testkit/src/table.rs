//! An in-memory `Customers` table that evaluates the statements it runs.
//!
//! [`MemoryDatabase`](entimap_driver::MemoryDatabase) answers with canned
//! rows. [`CustomerTable`] instead filters, counts and pages its own data
//! from the compiled SQL, so a test asserts on what a statement selects
//! rather than on rows it scripted. It understands the statements the
//! builder emits for unjoined `Customer` queries: a `Name` LIKE filter,
//! the paging counter, `OFFSET .. FETCH NEXT` and `COUNT(*)`. Rows are
//! kept in key order.

use crate::fixtures::catalog;
use crate::integration::CUSTOMER_COLUMNS;
use entimap_codec::Value;
use entimap_core::DbContext;
use entimap_driver::{
    Command, Connection, ConnectionFactory, DriverError, DriverResult, RowSet,
};
use std::sync::Arc;

/// Read-only customers with ids `1..=n` in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CustomerTable {
    names: Arc<Vec<String>>,
}

impl CustomerTable {
    /// A table holding `names`.
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: Arc::new(names.iter().map(|n| (*n).to_string()).collect()),
        }
    }

    /// A table of `count` customers named `customer <id>`.
    pub fn numbered(count: u64) -> Self {
        Self {
            names: Arc::new((1..=count).map(|id| format!("customer {id}")).collect()),
        }
    }

    /// A context owning connections to this table.
    pub fn context(&self) -> DbContext {
        DbContext::new(catalog(), self.clone())
    }
}

impl ConnectionFactory for CustomerTable {
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(TableConnection {
            names: Arc::clone(&self.names),
            open: false,
            transaction: false,
        }))
    }
}

struct TableConnection {
    names: Arc<Vec<String>>,
    open: bool,
    transaction: bool,
}

impl TableConnection {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::command("connection is not open"))
        }
    }

    /// Rows passing the statement's filter.
    fn matching(&self, command: &Command) -> DriverResult<Vec<(i64, &str)>> {
        let rows = (1_i64..).zip(self.names.iter().map(String::as_str));
        if !command.sql.contains("LIKE @Name") {
            return Ok(rows.collect());
        }
        let Some(Value::Text(pattern)) = command.parameters.get("@Name") else {
            return Err(DriverError::command("@Name is not bound to text"));
        };
        let escape = command.sql.contains("ESCAPE '\\'").then_some('\\');
        Ok(rows.filter(|(_, name)| like(pattern, name, escape)).collect())
    }
}

impl Connection for TableConnection {
    fn open(&mut self) -> DriverResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.open = false;
        self.transaction = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn execute(&mut self, _command: &Command) -> DriverResult<u64> {
        Err(DriverError::command("the customer table is read-only"))
    }

    fn query(&mut self, command: &Command) -> DriverResult<RowSet<'_>> {
        self.ensure_open()?;
        let matching = self.matching(command)?;
        let total = Value::from(i64::try_from(matching.len()).unwrap_or(i64::MAX));
        if command.sql.starts_with("SELECT COUNT(") {
            return Ok(RowSet::from_rows(vec!["C".into()], vec![vec![total]]));
        }
        if command.sql.starts_with("SELECT 1 ") {
            let rows = matching.iter().map(|_| vec![Value::from(1)]).collect();
            return Ok(RowSet::from_rows(vec!["C".into()], rows));
        }

        let counted = command.sql.contains("CROSS JOIN");
        let (skip, take) = window(&command.sql).unwrap_or((0, usize::MAX));
        let mut columns: Vec<String> = CUSTOMER_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        if counted {
            columns.push("C1".into());
        }
        let rows = matching
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(id, name)| {
                let mut row = vec![Value::from(id), Value::from(name), Value::Null];
                if counted {
                    row.push(total.clone());
                }
                row
            })
            .collect();
        Ok(RowSet::from_rows(columns, rows))
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.transaction
    }
}

/// Rows skipped and fetched by an `OFFSET n ROWS FETCH NEXT m ROWS ONLY` tail.
fn window(sql: &str) -> Option<(usize, usize)> {
    let words: Vec<&str> = sql.split_whitespace().collect();
    let after = |keyword: &str| {
        let at = words.iter().rposition(|w| *w == keyword)?;
        words.get(at + 1)?.parse().ok()
    };
    Some((after("OFFSET")?, after("NEXT")?))
}

/// Case-insensitive LIKE with `%`, `_` and an optional escape character.
fn like(pattern: &str, text: &str, escape: Option<char>) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();
    like_at(&pattern, &text, escape)
}

fn like_at(pattern: &[char], text: &[char], escape: Option<char>) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'%', rest)) => (0..=text.len()).any(|i| like_at(rest, &text[i..], escape)),
        Some((&'_', rest)) => !text.is_empty() && like_at(rest, &text[1..], escape),
        Some((&c, rest)) if Some(c) == escape => match rest.split_first() {
            Some((&literal, rest)) => {
                text.first() == Some(&literal) && like_at(rest, &text[1..], escape)
            }
            None => false,
        },
        Some((&c, rest)) => text.first() == Some(&c) && like_at(rest, &text[1..], escape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_honours_wildcards_and_escapes() {
        assert!(like("%an%", "Anna", None));
        assert!(!like("%an%", "Ben", None));
        assert!(like("b_n", "Ben", None));
        assert!(like(r"%50\%%", "save 50% now", Some('\\')));
        assert!(!like(r"%50\%%", "save 500 now", Some('\\')));
    }

    #[test]
    fn window_reads_the_paging_tail() {
        let sql = "SELECT 1 FROM [T] ORDER BY [Id] ASC OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY";
        assert_eq!(window(sql), Some((20, 10)));
        assert_eq!(window("SELECT 1 FROM [T]"), None);
    }
}
