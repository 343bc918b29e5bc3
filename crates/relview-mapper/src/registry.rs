//! Named mapper registry consulted by name-based `map_with`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use relview_core::prelude::{Error, Result, Value};

type MapFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// A named value -> value function applied to every materialized item.
#[derive(Clone)]
pub struct Mapper {
    name: String,
    f: Arc<MapFn>,
}

impl Mapper {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, value: Value) -> Result<Value> {
        (self.f)(value)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapper({})", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    mappers: BTreeMap<String, Mapper>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, mapper: Mapper) -> Self {
        self.mappers.insert(mapper.name.clone(), mapper);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Mapper> {
        self.mappers
            .get(name)
            .ok_or_else(|| Error::MapperNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
