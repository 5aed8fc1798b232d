//! Paging and total counts.

use entimap_core::{CoreError, PropertyRef, QueryOptions};
use entimap_driver::MemoryDatabase;
use entimap_testkit::prelude::*;
use proptest::prelude::*;

fn paged(index: u32, size: u32) -> QueryOptions {
    QueryOptions::new().without_eager_load().page(index, size)
}

#[test]
fn page_carries_total_from_counter_column() {
    let db = MemoryDatabase::new();
    script_customer_page(&db, 11, 20, 35);
    let ctx = context(&db);

    let page = ctx.find_page::<Customer>(&paged(2, 10)).unwrap();

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0].id, 11);
    assert_eq!(page.total_count, 35);
    assert_eq!(page.page_index, 2);
    assert_eq!(page.page_size, Some(10));
    assert_eq!(page.page_count(), 4);

    let sql = &db.statements()[0];
    assert!(sql.contains("CROSS JOIN (SELECT COUNT(*) AS [C1] FROM [Customers] AS [T1]) AS [T2]"));
    assert!(sql.ends_with("ORDER BY [T1].[Id] ASC OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"));
}

#[test]
fn page_past_the_end_falls_back_to_count() {
    let db = MemoryDatabase::new();
    db.on_scalar("SELECT COUNT(*)").returns_scalar(35_i64);
    let ctx = context(&db);

    let page = ctx.find_page::<Customer>(&paged(9, 10)).unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 35);
    assert_eq!(db.connections_created(), 1);
}

#[test]
fn page_past_the_end_recounts_through_the_joins() {
    let db = MemoryDatabase::new();
    db.on_scalar("COUNT(DISTINCT").returns_scalar(3_i64);
    let options = QueryOptions::new()
        .include("Orders")
        .filter(PropertyRef::of("Orders", "Total").gt(5.0))
        .page(9, 10);

    let page = context(&db).find_page::<Customer>(&options).unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 3);
    let statements = db.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[1],
        "SELECT COUNT(DISTINCT [T1].[Id]) FROM [Customers] AS [T1] \
         LEFT OUTER JOIN [Orders] AS [T2] ON [T1].[Id] = [T2].[CustomerId] \
         WHERE [T2].[Total] > @Total"
    );
}

#[test]
fn joined_page_can_hold_fewer_owners_than_its_size() {
    let db = MemoryDatabase::new();
    let mut columns = CUSTOMER_ORDER_COLUMNS.to_vec();
    columns.push("C1");
    let rows = [(10, 5.0), (11, 7.5)]
        .into_iter()
        .map(|order| {
            let mut row = customer_order_row(1, "Ann", Some(order));
            row.push(3.into());
            row
        })
        .collect();
    db.on_query("FROM [Customers]").returns_rows(&columns, rows);

    let page = context(&db)
        .find_page::<Customer>(&QueryOptions::new().include("Orders").page(1, 2))
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].orders.len(), 2);
    assert_eq!(page.total_count, 3);
    assert_eq!(page.page_count(), 2);
    assert!(db.statements()[0].contains("COUNT(DISTINCT [T1].[Id])"));
}

#[test]
fn pages_slice_the_table_by_index_and_size() {
    // (rows in table, page size, page index, ids on the page, page count)
    let cases: [(u64, u32, u32, &[i64], u64); 7] = [
        (35, 10, 1, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 4),
        (35, 10, 4, &[31, 32, 33, 34, 35], 4),
        (35, 10, 5, &[], 4),
        (30, 10, 3, &[21, 22, 23, 24, 25, 26, 27, 28, 29, 30], 3),
        (1, 1, 1, &[1], 1),
        (7, 3, 2, &[4, 5, 6], 3),
        (0, 5, 1, &[], 0),
    ];
    for (rows, size, index, ids, pages) in cases {
        let page = CustomerTable::numbered(rows)
            .context()
            .find_page::<Customer>(&paged(index, size))
            .unwrap();

        let got: Vec<i64> = page.items.iter().map(|c| c.id).collect();
        assert_eq!(got, ids, "{rows} rows, page {index} of size {size}");
        assert_eq!(page.total_count, rows, "{rows} rows, page {index} of size {size}");
        assert_eq!(page.page_count(), pages, "{rows} rows, page {index} of size {size}");
    }
}

#[test]
fn unpaged_total_is_the_row_count() {
    let db = MemoryDatabase::new();
    script_customers(&db, &[(1, "Ann"), (2, "Ben"), (3, "Cy")]);

    let page = context(&db)
        .find_page::<Customer>(&QueryOptions::new().without_eager_load())
        .unwrap();

    assert_eq!(page.total_count, 3);
    assert_eq!(page.page_index, 1);
    assert_eq!(page.page_size, None);
    assert_eq!(page.page_count(), 1);
}

#[test]
fn invalid_page_index_is_rejected() {
    let db = MemoryDatabase::new();
    let err = context(&db)
        .find_page::<Customer>(&paged(0, 10))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidPage { page_index: 0 }));
}

#[test]
fn keyless_entities_cannot_be_paged_without_sort_keys() {
    let db = MemoryDatabase::new();
    let ctx = context(&db);
    assert!(matches!(
        ctx.find_page::<AuditEntry>(&QueryOptions::new().page(1, 5)),
        Err(CoreError::MissingPrimaryKey { .. })
    ));
    assert!(ctx
        .find_page::<AuditEntry>(&QueryOptions::new().order_by("Message").page(1, 5))
        .is_ok());
}

proptest! {
    #[test]
    fn total_is_independent_of_the_page(rows in 0u64..60, size in 1u32..15, index in 1u32..8) {
        let skipped = u64::from(size) * u64::from(index - 1);
        let expected: Vec<i64> = (1..=rows)
            .skip(usize::try_from(skipped).unwrap())
            .take(size as usize)
            .map(|id| i64::try_from(id).unwrap())
            .collect();

        let page = CustomerTable::numbered(rows)
            .context()
            .find_page::<Customer>(&paged(index, size))
            .unwrap();

        prop_assert_eq!(page.total_count, rows);
        prop_assert_eq!(page.items.iter().map(|c| c.id).collect::<Vec<_>>(), expected);
        prop_assert_eq!(page.page_count(), rows.div_ceil(u64::from(size)));
    }
}
