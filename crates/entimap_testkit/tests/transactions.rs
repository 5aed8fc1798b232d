//! Transactions and connection lifecycle.

use entimap_core::{CoreError, DbContext, QueryOptions};
use entimap_driver::{Connection, ConnectionEvent, DriverError, MemoryDatabase};
use entimap_testkit::prelude::*;

#[test]
fn each_call_gets_its_own_connection_outside_a_transaction() {
    let db = MemoryDatabase::new();
    let ctx = context(&db);

    ctx.count::<Customer>(&QueryOptions::new()).unwrap();
    ctx.enqueue_add(Customer::named("Ann"));
    ctx.flush().unwrap();

    assert_eq!(db.connections_created(), 2);
    assert_eq!(db.open_count(), 2);
    assert_eq!(db.close_count(), 2);
    assert!(db.commands().iter().any(|c| c.connection == 2));
}

#[test]
fn committed_flush_runs_on_the_transaction_connection() {
    let db = MemoryDatabase::new();
    let ctx = context(&db);

    ctx.begin_transaction().unwrap();
    ctx.enqueue_add(Customer::named("Ann"));
    ctx.flush().unwrap();
    ctx.count::<Customer>(&QueryOptions::new()).unwrap();
    ctx.commit().unwrap();

    assert!(db.commands().iter().all(|c| c.connection == 1));
    assert_eq!(
        db.events(),
        vec![
            ConnectionEvent::Opened(1),
            ConnectionEvent::Began(1),
            ConnectionEvent::Committed(1),
            ConnectionEvent::Closed(1),
        ]
    );

    // After commit the context is back to connection-per-call.
    ctx.count::<Customer>(&QueryOptions::new()).unwrap();
    assert_eq!(db.connections_created(), 2);
}

#[test]
fn failed_flush_inside_a_transaction_can_be_rolled_back() {
    let db = MemoryDatabase::new();
    let ctx = context(&db);

    ctx.begin_transaction().unwrap();
    ctx.enqueue_add(Customer::named("Ann"));
    ctx.enqueue_remove(Tag::new("missing", "ui", ""));
    assert!(ctx.flush().is_err());
    assert!(ctx.is_transaction_active());
    ctx.rollback().unwrap();

    assert_eq!(db.rollback_count(), 1);
    assert_eq!(db.commit_count(), 0);
    assert!(!ctx.is_transaction_active());
}

#[test]
fn transaction_misuse_is_rejected() {
    let db = MemoryDatabase::new();
    let ctx = context(&db);

    assert!(matches!(ctx.commit(), Err(CoreError::InvalidOperation { .. })));
    ctx.begin_transaction().unwrap();
    assert!(matches!(
        ctx.begin_transaction(),
        Err(CoreError::InvalidOperation { .. })
    ));
    ctx.rollback().unwrap();
}

#[test]
fn open_failures_leave_no_transaction_behind() {
    let db = MemoryDatabase::new();
    db.fail_next_open("server unavailable");
    let ctx = context(&db);

    assert!(matches!(
        ctx.begin_transaction(),
        Err(CoreError::Driver(DriverError::Command { .. }))
    ));
    assert!(!ctx.is_transaction_active());
    ctx.begin_transaction().unwrap();
    ctx.commit().unwrap();
}

#[test]
fn borrowed_connection_survives_the_context() {
    let db = MemoryDatabase::new();
    let mut connection = db.connection();
    connection.open().unwrap();
    let ctx = DbContext::with_connection(catalog(), Box::new(connection));

    ctx.begin_transaction().unwrap();
    ctx.enqueue_add(Customer::named("Ann"));
    ctx.flush().unwrap();
    ctx.commit().unwrap();
    ctx.count::<Customer>(&QueryOptions::new()).unwrap();

    assert_eq!(db.connections_created(), 1);
    assert_eq!(db.close_count(), 0);

    let mut connection = ctx.into_connection().unwrap();
    assert!(connection.is_open());
    connection.close().unwrap();
    assert_eq!(db.close_count(), 1);
}
