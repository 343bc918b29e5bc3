//! Schema-driven coercion at the relation level.

mod test_data_gen;

use relview_core::prelude::*;
use relview_core::tuple;
use relview_relation::{Materialize, MemoryDataset, Options, Relation};
use test_data_gen::*;

#[test]
fn test_schemaless_relation_uses_identity_transforms() {
    let r = Relation::build(users_dataset(), Options::new());
    assert!(!r.has_schema());
    assert!(r.input_transform().is_identity());
    assert!(r.output_transform().is_identity());

    let t = tuple! { "id" => 1, "anything" => "goes" };
    assert_eq!(r.coerce_input(t.clone()).unwrap(), t);

    let rows = r.materialize().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], Value::Tuple(tuple! { "id" => 1, "name" => "Jane" }));
}

#[test]
fn test_input_transform_strips_unknown_keys() {
    let r = users(&local_compiler());
    let cleaned = r
        .coerce_input(tuple! { "name" => "Jane", "id" => "7", "admin" => true })
        .unwrap();
    assert_eq!(cleaned, tuple! { "id" => 7, "name" => "Jane" });
}

#[test]
fn test_output_transform_projects_read_attributes() {
    let schema = Schema::new(vec![
        Attribute::new("id", DataType::Int).read(),
        Attribute::new("name", DataType::Str),
        Attribute::new("nickname", DataType::Str).nullable().read(),
    ]);
    let r = Relation::build(users_dataset(), Options::new().schema(schema));
    let rows = r.materialize().unwrap();
    assert_eq!(
        rows[0],
        Value::Tuple(tuple! { "id" => 1, "nickname" => Value::Null })
    );
}

#[test]
fn test_coercion_failure_surfaces_on_iteration() {
    let ds = MemoryDataset::new("users", vec![tuple! { "id" => "not a number" }]);
    let schema = Schema::new(vec![Attribute::new("id", DataType::Int).read()]);
    let r = Relation::build(ds, Options::new().schema(schema));

    // Construction is lazy; the bad value only matters once read.
    let mut rows = r.each().unwrap();
    match rows.next() {
        Some(Err(Error::SchemaMismatch { attribute, .. })) => assert_eq!(attribute, "id"),
        other => panic!("expected schema mismatch, got {other:?}"),
    }
}

#[test]
fn test_dataset_errors_pass_through() {
    let r = Relation::build(FailingDataset, Options::new());
    let results: Vec<_> = r.each().unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    match &results[1] {
        Err(Error::Dataset(inner)) => {
            assert!(inner.downcast_ref::<Broken>().is_some());
        }
        other => panic!("expected dataset error, got {other:?}"),
    }
}

#[test]
fn test_new_keeps_options_for_another_dataset() {
    let compiler = local_compiler();
    let r = users(&compiler).with(Options::new().auto_struct(true));
    let other = std::sync::Arc::new(MemoryDataset::new(
        "users",
        vec![tuple! { "id" => 3, "name" => "Ann" }],
    ));
    let moved = r.new(other, Options::new());

    assert!(moved.auto_struct());
    let rows = moved.materialize().unwrap();
    let user = rows[0].as_struct().unwrap();
    assert_eq!(user.type_name(), "users");
    assert_eq!(user["name"], Value::from("Ann"));

    // Same dataset, no options: same output.
    let again = r.new(std::sync::Arc::clone(r.dataset()), Options::new());
    assert_eq!(again.materialize().unwrap(), r.materialize().unwrap());
}

#[test]
fn test_read_schema_round_trips_rows() {
    let ds = MemoryDataset::new(
        "items",
        vec![
            tuple! { "id" => 1, "name" => "a" },
            tuple! { "id" => 2, "name" => "b" },
        ],
    );
    let schema = Schema::new(vec![
        Attribute::new("id", DataType::Int).read(),
        Attribute::new("name", DataType::Str).read(),
    ]);
    let r = Relation::build(ds, Options::new().schema(schema).compiler(local_compiler()));

    assert_eq!(
        r.materialize().unwrap(),
        vec![
            Value::Tuple(tuple! { "id" => 1, "name" => "a" }),
            Value::Tuple(tuple! { "id" => 2, "name" => "b" }),
        ]
    );

    let structs = r.with(Options::new().auto_struct(true)).materialize().unwrap();
    let first = structs[0].as_struct().unwrap();
    assert_eq!((first["id"].as_int(), first["name"].as_str()), (Some(1), Some("a")));
    let second = structs[1].as_struct().unwrap();
    assert_eq!((second["id"].as_int(), second["name"].as_str()), (Some(2), Some("b")));
}
