//! Statement compilation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use entimap_core::query::{SqlServer, Sqlite};
use entimap_core::{prop, ConventionOracle, Entity, Projection, QueryBuilder, QueryOptions};
use entimap_testkit::fixtures::{catalog, Customer, Tag};

/// Benchmark SELECT compilation with and without joins and paging.
fn bench_select(c: &mut Criterion) {
    let oracle = ConventionOracle::new(catalog());
    let mut group = c.benchmark_group("select");

    let cases = [
        ("plain", QueryOptions::new().without_eager_load()),
        (
            "filtered",
            QueryOptions::new()
                .without_eager_load()
                .filter(prop("Name").contains("an").and(prop("Id").gt(10))),
        ),
        ("auto_eager_load", QueryOptions::new()),
        (
            "paged_join",
            QueryOptions::new()
                .include("Orders")
                .filter(prop("Name").starts_with("A"))
                .order_by_desc("Name")
                .page(3, 25),
        ),
    ];

    for (name, options) in &cases {
        group.bench_function(*name, |b| {
            let builder = QueryBuilder::new(&oracle, &SqlServer);
            b.iter(|| {
                let statement = builder
                    .build_select("Customer", black_box(options), &Projection::Entity)
                    .unwrap();
                black_box(statement);
            });
        });
    }

    group.bench_function("paged_sqlite", |b| {
        let builder = QueryBuilder::new(&oracle, &Sqlite);
        let options = QueryOptions::new().without_eager_load().page(3, 25);
        b.iter(|| {
            let statement = builder
                .build_select("Customer", black_box(&options), &Projection::Entity)
                .unwrap();
            black_box(statement);
        });
    });

    group.finish();
}

/// Benchmark mutation compilation.
fn bench_mutations(c: &mut Criterion) {
    let oracle = ConventionOracle::new(catalog());
    let builder = QueryBuilder::new(&oracle, &SqlServer);
    let mut group = c.benchmark_group("mutation");

    let customer = Customer::named("Ann").to_record();
    let tag = Tag::new("red", "ui", "#f00").to_record();

    group.bench_function("insert_identity", |b| {
        b.iter(|| black_box(builder.build_insert("Customer", black_box(&customer)).unwrap()));
    });
    group.bench_function("update_composite_key", |b| {
        b.iter(|| black_box(builder.build_update("Tag", black_box(&tag)).unwrap()));
    });
    group.bench_function("existence_check", |b| {
        b.iter(|| black_box(builder.build_existence_check("Tag", black_box(&tag)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_select, bench_mutations);
criterion_main!(benches);
