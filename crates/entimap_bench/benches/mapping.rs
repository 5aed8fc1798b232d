//! Row mapping benchmarks over the scripted driver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entimap_core::QueryOptions;
use entimap_driver::MemoryDatabase;
use entimap_testkit::fixtures::Customer;
use entimap_testkit::integration::{context, customer_order_row, script_customer_orders, script_customers};

/// Benchmark streaming reads: one entity per row.
fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_streaming");

    for rows in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, &rows| {
            let db = MemoryDatabase::new();
            let names: Vec<String> = (0..rows).map(|i| format!("customer {i}")).collect();
            let customers: Vec<(i64, &str)> = names
                .iter()
                .enumerate()
                .map(|(i, name)| (i as i64 + 1, name.as_str()))
                .collect();
            script_customers(&db, &customers);
            let ctx = context(&db);
            let options = QueryOptions::new().without_eager_load();

            b.iter(|| {
                let found: Vec<Customer> = ctx.find_many(black_box(&options)).unwrap();
                black_box(found);
            });
        });
    }
    group.finish();
}

/// Benchmark buffered reads: joined rows merged by owner identity.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_fanout");

    for orders_per_customer in [1, 10, 50].iter() {
        let customers = 100;
        group.throughput(Throughput::Elements((customers * orders_per_customer) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(orders_per_customer),
            orders_per_customer,
            |b, &per| {
                let db = MemoryDatabase::new();
                let mut order_id = 0;
                let mut rows = Vec::new();
                for id in 1..=customers as i64 {
                    for _ in 0..per {
                        order_id += 1;
                        rows.push(customer_order_row(id, "customer", Some((order_id, 9.5))));
                    }
                }
                script_customer_orders(&db, rows);
                let ctx = context(&db);
                let options = QueryOptions::new().include("Orders");

                b.iter(|| {
                    let found: Vec<Customer> = ctx.find_many(black_box(&options)).unwrap();
                    black_box(found);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_streaming, bench_fanout);
criterion_main!(benches);
