//! Wrap and combine: attaching child relations under keys of a parent.
//!
//! Construction only rewrites schema and meta. Data moves at materialization:
//! `Nester` reads every child once, then decorates each parent tuple.

use std::collections::HashMap;

use relview_core::ast::Join;
use relview_core::hash::{hash_serde, Hash256};
use relview_core::prelude::{Association, Cardinality, Error, Result, Tuple, Value};
use relview_core::trace;

use crate::graph::Graph;
use crate::meta::Meta;
use crate::options::Options;
use crate::relation::Relation;

/// How a combined child hangs off its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct CombineSpec {
    pub cardinality: Cardinality,
    /// (parent attribute, child attribute) pairs.
    pub keys: Vec<(String, String)>,
}

impl CombineSpec {
    pub fn many(keys: &[(&str, &str)]) -> Self {
        Self::build(Cardinality::Many, keys)
    }

    pub fn one(keys: &[(&str, &str)]) -> Self {
        Self::build(Cardinality::One, keys)
    }

    fn build(cardinality: Cardinality, keys: &[(&str, &str)]) -> Self {
        Self {
            cardinality,
            keys: keys
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl From<&Association> for CombineSpec {
    fn from(a: &Association) -> Self {
        Self {
            cardinality: a.cardinality,
            keys: a.keys.clone(),
        }
    }
}

impl Relation {
    /// Nest every child's full output under the child's name.
    ///
    /// Children are exempt from independent auto-mapping; the parent's mapper
    /// shapes them through its own AST.
    pub fn wrap(&self, children: &[Relation]) -> Result<Relation> {
        let mut schema = self.schema().clone();
        let mut meta = self.meta().clone();

        for child in children {
            ensure_free_key(self, &meta, child.name())?;
            let wrapped = child.schema().wrap(child.name());
            let node = child.with(
                Options::new()
                    .schema(wrapped.clone())
                    .input(child.input_transform().clone())
                    .output(child.output_transform().clone())
                    .meta(Meta {
                        join: Join::Wrap,
                        ..child.meta().clone()
                    }),
            );
            schema = schema.merge(&wrapped);
            meta.nodes.push(node);
        }

        trace::emit(
            "wrap",
            &[
                ("relation", self.name().to_string()),
                ("children", children.len().to_string()),
            ],
        );

        // The parent's own attributes are unchanged, so its transforms carry over.
        Ok(self.with(
            Options::new()
                .schema(schema)
                .input(self.input_transform().clone())
                .output(self.output_transform().clone())
                .meta(meta),
        ))
    }

    /// Attach children joined on key pairs. Returns a `Graph`; reduce it with
    /// `Graph::into_relation` to keep composing.
    pub fn combine(&self, children: &[(Relation, CombineSpec)]) -> Result<Graph> {
        let mut nodes = Vec::with_capacity(children.len());
        let mut meta = self.meta().clone();

        for (child, spec) in children {
            ensure_free_key(self, &meta, child.name())?;
            if spec.keys.is_empty() {
                return Err(Error::InvalidComposition(format!(
                    "combine of '{}' into '{}' needs at least one key pair",
                    child.name(),
                    self.name()
                )));
            }
            for (parent_key, child_key) in &spec.keys {
                ensure_join_key(self, parent_key)?;
                ensure_join_key(child, child_key)?;
            }
            let node = child.with(Options::new().meta(Meta {
                join: Join::Combine {
                    cardinality: spec.cardinality,
                    keys: spec.keys.clone(),
                },
                ..child.meta().clone()
            }));
            // Later children see earlier ones when checking key collisions.
            meta.nodes.push(node.clone());
            nodes.push(node);
        }

        trace::emit(
            "combine",
            &[
                ("relation", self.name().to_string()),
                ("children", children.len().to_string()),
            ],
        );
        Graph::build(self.clone(), nodes)
    }

    /// Combine using the parent's declared associations. Each child is matched
    /// by association name, then by association target, and is renamed to the
    /// association name.
    pub fn combine_assoc(&self, children: &[Relation]) -> Result<Graph> {
        let mut specs = Vec::with_capacity(children.len());
        for child in children {
            let assoc = self
                .associations()
                .values()
                .find(|a| a.name == child.name())
                .or_else(|| {
                    self.associations()
                        .values()
                        .find(|a| a.target == child.name())
                })
                .ok_or_else(|| Error::AssociationNotFound {
                    relation: self.name().to_string(),
                    name: child.name().to_string(),
                })?;
            specs.push((child.with_name(&assoc.name), CombineSpec::from(assoc)));
        }
        self.combine(&specs)
    }
}

fn ensure_free_key(parent: &Relation, meta: &Meta, key: &str) -> Result<()> {
    let taken_by_node = meta.nodes.iter().any(|n| n.name() == key);
    let taken_by_attr = parent
        .schema()
        .attributes()
        .iter()
        .any(|a| !a.wrap && a.name == key);
    if taken_by_node || taken_by_attr {
        return Err(Error::InvalidComposition(format!(
            "key '{key}' is already used in relation '{}'",
            parent.name()
        )));
    }
    Ok(())
}

/// Join keys are checked against the relation's own attributes. Wrapped ones
/// never count, and a relation with no own attributes accepts any key. Keys
/// must survive the read projection, since nesting runs on projected tuples.
fn ensure_join_key(relation: &Relation, key: &str) -> Result<()> {
    let own = relation.schema().non_wrapped_subset();
    if own.is_empty() {
        return Ok(());
    }
    let attr = own
        .iter()
        .find(|a| a.name == key)
        .ok_or_else(|| Error::AttributeNotFound {
            relation: relation.name().to_string(),
            name: key.to_string(),
        })?;
    if !attr.read && own.iter().any(|a| a.read) {
        return Err(Error::InvalidComposition(format!(
            "join key '{key}' is not read by relation '{}'",
            relation.name()
        )));
    }
    Ok(())
}

enum Slot {
    Wrap {
        key: String,
        rows: Vec<Value>,
    },
    Combine {
        key: String,
        cardinality: Cardinality,
        parent_keys: Vec<String>,
        groups: HashMap<Hash256, Vec<Value>>,
    },
}

/// Child data buffered for one pass over a parent.
pub(crate) struct Nester {
    slots: Vec<Slot>,
}

impl Nester {
    pub(crate) fn prepare(nodes: &[Relation]) -> Result<Self> {
        let mut slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            let key = node.name().to_string();
            match &node.meta().join {
                Join::Combine { cardinality, keys } => {
                    let child_keys: Vec<String> = keys.iter().map(|(_, c)| c.clone()).collect();
                    let mut groups: HashMap<Hash256, Vec<Value>> = HashMap::new();
                    for row in node.tuples()? {
                        let row = row?;
                        if let Some(h) = key_hash(&row, &child_keys, node.name())? {
                            groups.entry(h).or_default().push(Value::Tuple(row));
                        }
                    }
                    slots.push(Slot::Combine {
                        key,
                        cardinality: *cardinality,
                        parent_keys: keys.iter().map(|(p, _)| p.clone()).collect(),
                        groups,
                    });
                }
                Join::Wrap | Join::Root => {
                    let rows = node
                        .tuples()?
                        .map(|r| r.map(Value::Tuple))
                        .collect::<Result<Vec<_>>>()?;
                    slots.push(Slot::Wrap { key, rows });
                }
            }
        }
        Ok(Self { slots })
    }

    pub(crate) fn attach(&self, mut tuple: Tuple) -> Result<Tuple> {
        for slot in &self.slots {
            match slot {
                Slot::Wrap { key, rows } => tuple.insert(key.clone(), Value::List(rows.clone())),
                Slot::Combine {
                    key,
                    cardinality,
                    parent_keys,
                    groups,
                } => {
                    let matched = match key_hash(&tuple, parent_keys, key)? {
                        Some(h) => groups.get(&h).map(Vec::as_slice).unwrap_or(&[]),
                        None => &[],
                    };
                    let value = match cardinality {
                        Cardinality::Many => Value::List(matched.to_vec()),
                        Cardinality::One => matched.first().cloned().unwrap_or(Value::Null),
                    };
                    tuple.insert(key.clone(), value);
                }
            }
        }
        Ok(tuple)
    }
}

/// Hash of the key values; `None` when any of them is null or NaN (neither
/// joins).
fn key_hash(tuple: &Tuple, keys: &[String], context: &str) -> Result<Option<Hash256>> {
    let mut values = Vec::with_capacity(keys.len());
    for k in keys {
        match tuple.get(k) {
            Some(Value::Null) => return Ok(None),
            Some(Value::Float(f)) if f.is_nan() => return Ok(None),
            Some(v) => values.push(v),
            None => {
                return Err(Error::mismatch(
                    k.as_str(),
                    format!("join key missing while nesting '{context}'"),
                ))
            }
        }
    }
    hash_serde(&values).map(Some)
}
