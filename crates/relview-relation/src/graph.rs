//! `Graph`: a root relation plus combined children.
//!
//! A graph materializes like a relation but is not one; it must be reduced
//! with `into_relation` before it can be wrapped or combined again.

use std::sync::Arc;

use relview_core::ast::{ModelRef, RelationNode};
use relview_core::prelude::{Error, Result};

use crate::materialize::{Materialize, Rows};
use crate::meta::Meta;
use crate::options::Options;
use crate::relation::Relation;

#[derive(Debug, Clone)]
pub struct Graph {
    root: Relation,
    nodes: Vec<Relation>,
    combined: Relation,
}

impl Graph {
    /// Hang `nodes` off `root`. Every node must already carry a nested role.
    pub fn build(root: Relation, nodes: Vec<Relation>) -> Result<Graph> {
        if let Some(bad) = nodes.iter().find(|n| n.meta().is_root()) {
            return Err(Error::InvalidComposition(format!(
                "'{}' has no join role; combine or wrap it before adding it to a graph",
                bad.name()
            )));
        }
        let meta = Meta {
            nodes: root
                .meta()
                .nodes
                .iter()
                .cloned()
                .chain(nodes.iter().cloned())
                .collect(),
            ..root.meta().clone()
        };
        let combined = root.with(Options::new().meta(meta));
        Ok(Graph {
            root,
            nodes,
            combined,
        })
    }

    pub fn root(&self) -> &Relation {
        &self.root
    }

    pub fn nodes(&self) -> &[Relation] {
        &self.nodes
    }

    /// Rebuild the child named `name` through `f`, keeping its join role.
    pub fn node(&self, name: &str, f: impl FnOnce(&Relation) -> Relation) -> Result<Graph> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.name() == name)
            .ok_or_else(|| Error::AttributeNotFound {
                relation: self.root.name().to_string(),
                name: name.to_string(),
            })?;
        let old = &self.nodes[idx];
        let new = f(old);
        let new = new.with(Options::new().meta(Meta {
            join: old.meta().join.clone(),
            ..new.meta().clone()
        }));
        let mut nodes = self.nodes.clone();
        nodes[idx] = new;
        Graph::build(self.root.clone(), nodes)
    }

    /// The root with every child attached, usable wherever a relation is.
    pub fn into_relation(self) -> Relation {
        self.combined
    }

    pub fn relation(&self) -> &Relation {
        &self.combined
    }

    pub fn map_to(&self, model: ModelRef) -> Result<Graph> {
        Graph::build(self.root.map_to(model), self.nodes.clone())
    }
}

impl Materialize for Graph {
    fn each(&self) -> Result<Rows> {
        self.combined.each()
    }

    fn to_ast(&self) -> Result<Arc<RelationNode>> {
        self.combined.to_ast()
    }

    fn is_graph(&self) -> bool {
        true
    }
}
