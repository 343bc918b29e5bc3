use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use relview_core::prelude::*;
use relview_core::tuple;
use relview_mapper::MapperCompiler;
use relview_relation::{CombineSpec, Materialize, MemoryDataset, Options, Relation};

fn make_users(rows: usize) -> MemoryDataset {
    MemoryDataset::new(
        "users",
        (0..rows)
            .map(|i| tuple! { "id" => i as i64, "name" => format!("user-{i}") })
            .collect(),
    )
}

fn make_tasks(rows: usize) -> MemoryDataset {
    MemoryDataset::new(
        "tasks",
        (0..rows * 4)
            .map(|i| tuple! { "id" => i as i64, "user_id" => (i % rows) as i64, "title" => format!("task-{i}") })
            .collect(),
    )
}

fn users_schema() -> Schema {
    Schema::new(vec![
        Attribute::new("id", DataType::Int).read(),
        Attribute::new("name", DataType::Str).read(),
    ])
}

fn bench_mapper_cache_hit(c: &mut Criterion) {
    let compiler = Arc::new(MapperCompiler::unbounded());
    let base = Relation::build(
        make_users(1),
        Options::new()
            .schema(users_schema())
            .auto_struct(true)
            .compiler(Arc::clone(&compiler)),
    );
    base.mapper().unwrap();

    c.bench_function("mapper_cache_hit", |b| {
        b.iter(|| {
            // Fresh instance: new AST, same shape, cached mapper.
            let r = base.with_name("users");
            r.mapper().unwrap()
        })
    });
}

fn bench_materialize_structs(c: &mut Criterion) {
    let r = Relation::build(
        make_users(1024),
        Options::new().schema(users_schema()).auto_struct(true),
    );

    c.bench_function("materialize_structs_1024", |b| {
        b.iter(|| r.materialize().unwrap().len())
    });
}

fn bench_combine_many(c: &mut Criterion) {
    let users = Relation::build(make_users(256), Options::new().schema(users_schema()));
    let tasks = Relation::build(make_tasks(256), Options::new());
    let graph = users
        .combine(&[(tasks, CombineSpec::many(&[("id", "user_id")]))])
        .unwrap();

    c.bench_function("combine_many_256x1024", |b| {
        b.iter(|| graph.materialize().unwrap().len())
    });
}

criterion_group!(
    benches,
    bench_mapper_cache_hit,
    bench_materialize_structs,
    bench_combine_many
);
criterion_main!(benches);
