//! Scripted-database helpers for integration tests.
//!
//! Reader columns are named the way the query builder aliases them for the
//! fixture model, so scripted rows map exactly like real ones.

use crate::fixtures::catalog;
use entimap_codec::Value;
use entimap_core::DbContext;
use entimap_driver::MemoryDatabase;
use tracing_subscriber::EnvFilter;

/// Reader columns of a `Customer` query without joins.
pub const CUSTOMER_COLUMNS: [&str; 3] = ["Id", "Name", "Email"];

/// Reader columns of a `Customer` query joined to its orders.
pub const CUSTOMER_ORDER_COLUMNS: [&str; 6] = ["Id", "Name", "Email", "Id1", "CustomerId", "Total"];

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A context owning connections to `db`, over the fixture catalog.
pub fn context(db: &MemoryDatabase) -> DbContext {
    DbContext::new(catalog(), db.clone())
}

/// Scripts every `Customers` query to return the given `(id, name)` rows.
pub fn script_customers(db: &MemoryDatabase, customers: &[(i64, &str)]) {
    let rows = customers
        .iter()
        .map(|(id, name)| vec![Value::from(*id), Value::from(*name), Value::Null])
        .collect();
    db.on_query("FROM [Customers]").returns_rows(&CUSTOMER_COLUMNS, rows);
}

/// One row of a customer/order join; `None` for a customer without orders.
pub fn customer_order_row(id: i64, name: &str, order: Option<(i64, f64)>) -> Vec<Value> {
    let mut row = vec![Value::from(id), Value::from(name), Value::Null];
    match order {
        Some((order_id, total)) => {
            row.extend([Value::from(order_id), Value::from(id), Value::from(total)]);
        }
        None => row.extend([Value::Null, Value::Null, Value::Null]),
    }
    row
}

/// Scripts every `Customers` query to return customer/order join rows.
pub fn script_customer_orders(db: &MemoryDatabase, rows: Vec<Vec<Value>>) {
    db.on_query("FROM [Customers]")
        .returns_rows(&CUSTOMER_ORDER_COLUMNS, rows);
}

/// Rows `first..=last` of a paged `Customers` query, each carrying `total`
/// in the counter column `C1`.
pub fn script_customer_page(db: &MemoryDatabase, first: i64, last: i64, total: u64) {
    let total = i64::try_from(total).unwrap_or(i64::MAX);
    let rows = (first..=last)
        .map(|id| {
            vec![
                Value::from(id),
                Value::from(format!("customer {id}")),
                Value::Null,
                Value::from(total),
            ]
        })
        .collect();
    db.on_query("FROM [Customers]")
        .returns_rows(&["Id", "Name", "Email", "C1"], rows);
}
