use std::hint::black_box;

use catalog_analytics::analysis::catalog_analyses;
use catalog_analytics::config::{PricingConfig, ReportConfig};
use catalog_analytics::execution::{ExecutionEngine, ExecutionOptions};
use catalog_analytics::processing::{group_by, rank, GroupQuery, RankQuery};
use catalog_analytics::schema::SchemaRegistry;
use catalog_analytics::types::{DataSet, Value};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const MASTERS: [&str; 4] = ["Apparel", "Footwear", "Accessories", "Personal Care"];
const ARTICLES: [&str; 6] = ["Tshirts", "Shirts", "Watches", "Casual Shoes", "Socks", "Kurtas"];
const COLOURS: [&str; 5] = ["Blue", "Black", "White", "Red", "Grey"];

fn synthetic_catalog(n: usize) -> DataSet {
    let utf8 = |s: &str| Value::Utf8(s.to_string());
    let rows = (0..n)
        .map(|i| {
            vec![
                Value::Int64(i as i64),
                utf8(if i % 2 == 0 { "Men" } else { "Women" }),
                utf8(MASTERS[i % MASTERS.len()]),
                utf8("Topwear"),
                utf8(ARTICLES[(i * 7) % ARTICLES.len()]),
                utf8(COLOURS[(i * 3) % COLOURS.len()]),
                utf8("Summer"),
                Value::Int64(2010 + (i % 9) as i64),
                utf8("Casual"),
                // Price is the only number in the name so every band gets traffic.
                Value::Utf8(format!("{} Product {}", ARTICLES[i % ARTICLES.len()], (i * 37) % 5000)),
            ]
        })
        .collect();
    DataSet::new(SchemaRegistry::products().schema().clone(), rows)
}

fn bench_group_by(c: &mut Criterion) {
    let ds = synthetic_catalog(200_000);
    let query = GroupQuery::new(["masterCategory", "gender"]);
    let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();

    let mut group = c.benchmark_group("group_by");
    group.bench_function("sequential", |b| b.iter(|| group_by(black_box(&ds), &query).unwrap()));
    group.bench_function("parallel", |b| b.iter(|| engine.group_by(black_box(&ds), &query).unwrap()));
    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let ds = synthetic_catalog(200_000);
    let query = RankQuery::new(["articleType"]).partitioned_by(["masterCategory"]).top(5);
    c.bench_function("rank_article_types", |b| b.iter(|| rank(black_box(&ds), &query).unwrap()));
}

fn bench_analyses(c: &mut Criterion) {
    let analyses = catalog_analyses(&PricingConfig::default(), &ReportConfig::default());
    let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();

    let mut group = c.benchmark_group("catalog_analyses");
    for n in [10_000usize, 100_000] {
        let ds = synthetic_catalog(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ds, |b, ds| {
            b.iter(|| engine.run_analyses(ds, &analyses).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_group_by, bench_rank, bench_analyses);
criterion_main!(benches);
