//! AST -> mapper compilation with content-addressed caching.
//!
//! A `CompiledMapper` is a small executable plan: which attributes to keep (in
//! header order), which nested relations to recurse into, and what to build at
//! each level (tuple, generic struct, or custom model instance).

use std::num::NonZeroUsize;
use std::sync::Arc;

use once_cell::sync::Lazy;

use relview_core::ast::{ModelFlag, ModelRef, RelationNode};
use relview_core::config::{CacheStrategy, RelviewConfig};
use relview_core::hash::Hash256;
use relview_core::prelude::{Error, Result, Struct, Tuple, Value};
use relview_core::trace;

use crate::cache::{LruMapperCache, MapperCache, UnboundedMapperCache};

#[derive(Debug, Clone)]
enum Output {
    Tuple,
    Generic(String),
    Custom(ModelRef),
}

#[derive(Debug, Clone)]
struct Plan {
    /// Empty means the relation declared no attributes: keep every key.
    attributes: Vec<String>,
    nested: Vec<(String, Plan)>,
    output: Output,
}

impl Plan {
    fn build(node: &RelationNode, inherit_structs: Option<bool>) -> Plan {
        let output = match (&node.meta.model, inherit_structs) {
            (ModelFlag::Custom(model), _) => Output::Custom(model.clone()),
            // Nested nodes follow the root's decision unless they carry a model.
            (_, Some(true)) => Output::Generic(node.name.clone()),
            (_, Some(false)) => Output::Tuple,
            (ModelFlag::Generic, None) => Output::Generic(node.name.clone()),
            (ModelFlag::Disabled, None) => Output::Tuple,
        };
        let structs = match inherit_structs {
            Some(s) => s,
            None => !node.meta.model.is_disabled(),
        };
        Plan {
            attributes: node.attributes().map(|a| a.name.clone()).collect(),
            nested: node
                .nodes()
                .map(|child| (child.name.clone(), Plan::build(child, Some(structs))))
                .collect(),
            output,
        }
    }

    fn call(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Tuple(t) => self.call_tuple(t),
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|v| self.call(v))
                    .collect::<Result<Vec<_>>>()?,
            )),
            // Already mapped upstream.
            v @ Value::Struct(_) => Ok(v),
            other => Err(Error::mismatch(
                "<tuple>",
                format!("mapper expects a tuple, got {:?}", other.data_type()),
            )),
        }
    }

    fn call_tuple(&self, mut tuple: Tuple) -> Result<Value> {
        let mut nested = Vec::with_capacity(self.nested.len());
        for (key, plan) in &self.nested {
            let v = tuple.remove(key).unwrap_or(Value::Null);
            nested.push((key.clone(), plan.call(v)?));
        }

        let mut out = if self.attributes.is_empty() {
            tuple
        } else {
            let mut out = Tuple::with_capacity(self.attributes.len() + nested.len());
            // Absent keys stay absent; nullable ones were filled by the output transform.
            for name in &self.attributes {
                if let Some(v) = tuple.remove(name) {
                    out.insert(name.clone(), v);
                }
            }
            out
        };
        for (key, v) in nested {
            out.insert(key, v);
        }

        Ok(match &self.output {
            Output::Tuple => Value::Tuple(out),
            Output::Generic(name) => Value::Struct(Struct::new(name.clone(), out)),
            Output::Custom(model) => Value::Struct(model.construct(out)?),
        })
    }
}

/// Pure tuple -> value function compiled from one AST shape.
#[derive(Debug)]
pub struct CompiledMapper {
    key: Hash256,
    plan: Plan,
}

impl CompiledMapper {
    pub fn key(&self) -> Hash256 {
        self.key
    }

    /// Map a coerced tuple (possibly carrying nested tuples/lists).
    pub fn call(&self, tuple: Tuple) -> Result<Value> {
        self.plan.call_tuple(tuple)
    }

    /// Map an arbitrary value: tuples, lists of tuples, or null.
    pub fn call_value(&self, value: Value) -> Result<Value> {
        self.plan.call(value)
    }
}

static GLOBAL: Lazy<Arc<MapperCompiler>> =
    Lazy::new(|| Arc::new(MapperCompiler::from_config(&RelviewConfig::from_env())));

/// Compiles ASTs, memoizing one mapper per distinct shape.
pub struct MapperCompiler {
    cache: Box<dyn MapperCache>,
}

impl MapperCompiler {
    pub fn new(cache: impl MapperCache + 'static) -> Self {
        Self {
            cache: Box::new(cache),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(UnboundedMapperCache::new())
    }

    pub fn from_config(cfg: &RelviewConfig) -> Self {
        match cfg.mapper_cache {
            CacheStrategy::Lru { capacity } => match NonZeroUsize::new(capacity) {
                Some(cap) => Self::new(LruMapperCache::new(cap)),
                None => Self::unbounded(),
            },
            CacheStrategy::Unbounded => Self::unbounded(),
        }
    }

    /// Process-wide compiler, configured from the environment on first use.
    pub fn global() -> Arc<MapperCompiler> {
        Arc::clone(&GLOBAL)
    }

    pub fn compile(&self, ast: &RelationNode) -> Result<Arc<CompiledMapper>> {
        let key = ast.fingerprint()?;

        if let Some(hit) = self.cache.get(&key) {
            trace::emit(
                "mapper_cache_hit",
                &[("relation", ast.name.clone()), ("key", key.short())],
            );
            return Ok(hit);
        }

        trace::emit(
            "mapper_compile",
            &[
                ("relation", ast.name.clone()),
                ("key", key.short()),
                ("strategy", self.cache.strategy().to_string()),
            ],
        );
        let compiled = Arc::new(CompiledMapper {
            key,
            plan: Plan::build(ast, None),
        });
        Ok(self.cache.get_or_insert(key, compiled))
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for MapperCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperCompiler")
            .field("strategy", &self.cache.strategy())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relview_core::ast::{AstMeta, AttributeNode, HeaderNode, Join};
    use relview_core::schema::{Cardinality, DataType};
    use relview_core::tuple;

    fn attr(name: &str) -> HeaderNode {
        HeaderNode::Attribute(AttributeNode {
            name: name.into(),
            data_type: DataType::Any,
            nullable: false,
            source: None,
        })
    }

    fn rel(name: &str, model: ModelFlag, join: Join, header: Vec<HeaderNode>) -> RelationNode {
        RelationNode {
            name: name.into(),
            meta: AstMeta {
                dataset: name.into(),
                model,
                join,
            },
            header,
        }
    }

    #[test]
    fn same_shape_compiles_once() {
        let compiler = MapperCompiler::unbounded();
        let a = rel("users", ModelFlag::Generic, Join::Root, vec![attr("id")]);
        let b = a.clone();
        let m1 = compiler.compile(&a).unwrap();
        let m2 = compiler.compile(&b).unwrap();
        assert!(Arc::ptr_eq(&m1, &m2));
        assert_eq!(compiler.cached(), 1);

        let c = rel("users", ModelFlag::Disabled, Join::Root, vec![attr("id")]);
        let m3 = compiler.compile(&c).unwrap();
        assert!(!Arc::ptr_eq(&m1, &m3));
        assert_eq!(compiler.cached(), 2);
    }

    #[test]
    fn lru_evicts_old_shapes() {
        let compiler = MapperCompiler::new(LruMapperCache::new(NonZeroUsize::new(1).unwrap()));
        let a = rel("a", ModelFlag::Generic, Join::Root, vec![attr("id")]);
        let b = rel("b", ModelFlag::Generic, Join::Root, vec![attr("id")]);
        let first = compiler.compile(&a).unwrap();
        compiler.compile(&b).unwrap();
        assert_eq!(compiler.cached(), 1);
        let again = compiler.compile(&a).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn nested_nodes_follow_root_mode() {
        let compiler = MapperCompiler::unbounded();
        let tasks = rel(
            "tasks",
            ModelFlag::Disabled,
            Join::Combine {
                cardinality: Cardinality::Many,
                keys: vec![("id".into(), "user_id".into())],
            },
            vec![attr("title")],
        );
        let users = rel(
            "users",
            ModelFlag::Generic,
            Join::Root,
            vec![attr("id"), HeaderNode::Relation(tasks)],
        );
        let mapper = compiler.compile(&users).unwrap();
        let out = mapper
            .call(tuple! {
                "id" => 1,
                "ignored" => true,
                "tasks" => vec![tuple! { "title" => "t1", "user_id" => 1 }],
            })
            .unwrap();

        let user = out.as_struct().unwrap();
        assert_eq!(user.type_name(), "users");
        assert_eq!(user.get("ignored"), None);
        let tasks = user["tasks"].as_list().unwrap();
        let task = tasks[0].as_struct().unwrap();
        assert_eq!(task.type_name(), "tasks");
        assert_eq!(task["title"], Value::from("t1"));
        assert_eq!(task.get("user_id"), None);
    }
}
