//! Benchmarks for the IVM core: push dissemination and indexed fetch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rill_core::schema::TableBuilder;
use rill_core::{DataType, Row, Value};
use rill_ivm::{ArrayView, FetchRequest, Input, MemorySource, SourceChange};
use rill_index::SortSpec;

fn users() -> MemorySource {
    MemorySource::new(
        TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::Int)
            .unwrap()
            .add_column("group_id", DataType::Int)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    )
}

fn user(id: i64, group: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(group)])
}

fn bench_push_through_view(c: &mut Criterion) {
    c.bench_function("push_1k_rows_into_view", |b| {
        b.iter(|| {
            let source = users();
            let view = ArrayView::new(source.connect(SortSpec::ascending(&[0]), Vec::new()));
            view.hydrate().unwrap();
            for id in 0..1_000 {
                source
                    .push(SourceChange::add(user(id, id % 16)))
                    .unwrap();
            }
            black_box(view.len())
        })
    });
}

fn bench_constrained_fetch(c: &mut Criterion) {
    let source = users();
    let conn = source.connect(SortSpec::ascending(&[0]), Vec::new());
    for id in 0..10_000 {
        source.push(SourceChange::add(user(id, id % 64))).unwrap();
    }
    // Warm the secondary index once so the loop measures scans, not builds.
    conn.fetch(FetchRequest::constrained(1, Value::Int(0)))
        .unwrap()
        .count();

    c.bench_function("constrained_fetch_10k", |b| {
        b.iter(|| {
            let count = conn
                .fetch(FetchRequest::constrained(1, Value::Int(7)))
                .unwrap()
                .count();
            black_box(count)
        })
    });
}

criterion_group!(benches, bench_push_through_view, bench_constrained_fetch);
criterion_main!(benches);
