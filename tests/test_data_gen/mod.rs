//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use relview_core::prelude::*;
use relview_core::tuple;
use relview_mapper::MapperCompiler;
use relview_relation::dataset::TupleIter;
use relview_relation::{Dataset, MemoryDataset, Options, Relation};

pub fn users_dataset() -> MemoryDataset {
    MemoryDataset::new(
        "users",
        vec![
            tuple! { "id" => 1, "name" => "Jane" },
            tuple! { "id" => 2, "name" => "Joe" },
        ],
    )
}

pub fn tasks_dataset() -> MemoryDataset {
    MemoryDataset::new(
        "tasks",
        vec![
            tuple! { "id" => 1, "user_id" => 1, "title" => "Jane's task" },
            tuple! { "id" => 2, "user_id" => 2, "title" => "Joe's task" },
            tuple! { "id" => 3, "user_id" => 1, "title" => "Jane's other task" },
        ],
    )
}

pub fn users_schema() -> Schema {
    Schema::new(vec![
        Attribute::new("id", DataType::Int),
        Attribute::new("name", DataType::Str),
    ])
    .with_association(Association::many("tasks", vec![("id", "user_id")]))
}

pub fn tasks_schema() -> Schema {
    Schema::new(vec![
        Attribute::new("id", DataType::Int),
        Attribute::new("user_id", DataType::Int),
        Attribute::new("title", DataType::Str),
    ])
}

/// A private compiler so cache counts are not shared between tests.
pub fn local_compiler() -> Arc<MapperCompiler> {
    Arc::new(MapperCompiler::unbounded())
}

pub fn users(compiler: &Arc<MapperCompiler>) -> Relation {
    Relation::build(
        users_dataset(),
        Options::new()
            .schema(users_schema())
            .compiler(Arc::clone(compiler)),
    )
}

pub fn tasks(compiler: &Arc<MapperCompiler>) -> Relation {
    Relation::build(
        tasks_dataset(),
        Options::new()
            .schema(tasks_schema())
            .compiler(Arc::clone(compiler)),
    )
}

/// Model that stamps its own type name and upper-cases `name`.
#[derive(Debug)]
pub struct Person;

impl Model for Person {
    fn name(&self) -> &str {
        "Person"
    }

    fn construct(&self, mut attributes: Tuple) -> Result<Struct> {
        if let Some(Value::Str(name)) = attributes.get("name").cloned() {
            attributes.insert("name", name.to_uppercase());
        }
        Ok(Struct::new("Person", attributes))
    }
}

#[derive(Debug)]
pub struct Broken;

impl fmt::Display for Broken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection reset")
    }
}

impl std::error::Error for Broken {}

/// Yields one good tuple, then fails.
#[derive(Debug)]
pub struct FailingDataset;

impl Dataset for FailingDataset {
    fn name(&self) -> &str {
        "flaky"
    }

    fn digest(&self) -> Hash256 {
        relview_core::hash::hash_str("flaky")
    }

    fn tuples(&self) -> Result<TupleIter> {
        let rows: Vec<Result<Tuple>> = vec![
            Ok(tuple! { "id" => 1 }),
            Err(Error::dataset(Broken)),
        ];
        Ok(Box::new(rows.into_iter()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
