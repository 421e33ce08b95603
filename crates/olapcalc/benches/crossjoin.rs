//! Cross join benchmarks using divan
//!
//! A NON EMPTY cross join over a sparse cube, with and without operand
//! pruning.

use olapcalc::{
    Axis, CubeSchema, EngineConfig, Exp, InMemoryCatalog, InMemoryCellReader, Query, Statement,
};
use serde_json::json;
use std::sync::Arc;

fn main() {
    divan::main();
}

const PRODUCTS: usize = 40;
const STORES: usize = 40;

/// Products and stores with one fact for every seventh pair
fn sparse_cube() -> CubeSchema {
    let products: Vec<_> = (0..PRODUCTS).map(|i| json!({ "name": format!("P{i}") })).collect();
    let stores: Vec<_> = (0..STORES).map(|i| json!({ "name": format!("S{i}") })).collect();
    let facts: Vec<_> = (0..PRODUCTS * STORES)
        .filter(|n| n % 7 == 0)
        .map(|n| {
            json!({
                "coordinates": {
                    "Product": format!("P{}", n / STORES),
                    "Store": format!("S{}", n % STORES),
                },
                "measures": { "Sales": n % 13 + 1 },
            })
        })
        .collect();
    let schema = json!({
        "name": "Sparse",
        "dimensions": [
            {"name": "Product", "hierarchies": [{"levels": ["Item"], "members": products}]},
            {"name": "Store", "hierarchies": [{"levels": ["Shop"], "members": stores}]},
        ],
        "measures": [{"name": "Sales"}],
        "facts": facts,
    });
    CubeSchema::from_json(&schema.to_string()).unwrap()
}

fn statement(optimize: bool) -> Statement {
    let schema = sparse_cube();
    let catalog = Arc::new(InMemoryCatalog::from_schema(&schema).unwrap());
    let reader = Arc::new(InMemoryCellReader::from_schema(&schema, &catalog).unwrap());
    let threshold = if optimize { 0 } else { usize::MAX };
    Statement::new(catalog, reader)
        .unwrap()
        .with_config(EngineConfig::default().with_crossjoin_optimizer_size(threshold))
}

fn non_empty_query() -> Query {
    Query::new(vec![Axis::non_empty(Exp::func(
        "CrossJoin",
        vec![
            Exp::property(Exp::id("[Product].[Item]"), "Members"),
            Exp::property(Exp::id("[Store].[Shop]"), "Members"),
        ],
    ))])
}

#[divan::bench(args = [false, true])]
fn non_empty_cross_join(bencher: divan::Bencher, optimize: bool) {
    let statement = statement(optimize);
    let query = non_empty_query();
    bencher.bench_local(|| {
        let result = statement.execute(&query).unwrap();
        divan::black_box(result.cells.len())
    });
}

#[divan::bench]
fn explain_cross_join(bencher: divan::Bencher) {
    let statement = statement(true);
    let query = non_empty_query();
    bencher.bench_local(|| divan::black_box(statement.explain(&query).unwrap()));
}
