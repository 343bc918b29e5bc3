//! Canonical relation AST: the compiler's input and its cache key.
//!
//! Shape: `(relation, <name>, <meta>, (header, <attribute nodes> + <nested relation nodes>))`.
//! Everything here derives `PartialEq` and `Serialize`; two structurally equal
//! trees serialize to the same bytes and therefore hash to the same key.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::hash::{hash_serde, Hash256};
use crate::schema::{Attribute, Cardinality, DataType};
use crate::types::{Struct, Tuple};

/// Custom struct constructor attached to a relation through `map_to`/`map_with`.
///
/// Models are identified by `name()`: two models with the same name are the same
/// model as far as AST equality and mapper caching are concerned.
pub trait Model: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Build an instance from the already-projected (and nested) attributes.
    fn construct(&self, attributes: Tuple) -> Result<Struct>;
}

/// Shared handle to a `Model`, compared and serialized by name.
#[derive(Clone)]
pub struct ModelRef(pub Arc<dyn Model>);

impl ModelRef {
    pub fn new(model: impl Model + 'static) -> Self {
        Self(Arc::new(model))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn construct(&self, attributes: Tuple) -> Result<Struct> {
        self.0.construct(attributes)
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model({})", self.name())
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Serialize for ModelRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The `model` entry of an AST's meta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFlag {
    /// Auto-structuring is off and no model was set: map to tuples.
    Disabled,
    /// Auto-structuring is on: map to generic structs.
    Generic,
    /// Map through a custom model.
    Custom(ModelRef),
}

impl ModelFlag {
    pub fn is_disabled(&self) -> bool {
        matches!(self, ModelFlag::Disabled)
    }
}

/// How a nested relation hangs off its parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Join {
    #[default]
    Root,
    Wrap,
    Combine {
        cardinality: Cardinality,
        keys: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstMeta {
    /// Current dataset name (always overwritten from the live dataset).
    pub dataset: String,
    pub model: ModelFlag,
    pub join: Join,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeNode {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub source: Option<String>,
}

impl From<&Attribute> for AttributeNode {
    fn from(a: &Attribute) -> Self {
        Self {
            name: a.name.clone(),
            data_type: a.data_type,
            nullable: a.nullable,
            source: a.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum HeaderNode {
    Attribute(AttributeNode),
    Relation(RelationNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationNode {
    pub name: String,
    pub meta: AstMeta,
    pub header: Vec<HeaderNode>,
}

impl RelationNode {
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeNode> {
        self.header.iter().filter_map(|n| match n {
            HeaderNode::Attribute(a) => Some(a),
            HeaderNode::Relation(_) => None,
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RelationNode> {
        self.header.iter().filter_map(|n| match n {
            HeaderNode::Relation(r) => Some(r),
            HeaderNode::Attribute(_) => None,
        })
    }

    /// Content hash used as the mapper cache key.
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(model: ModelFlag) -> RelationNode {
        RelationNode {
            name: "users".into(),
            meta: AstMeta {
                dataset: "users".into(),
                model,
                join: Join::Root,
            },
            header: vec![HeaderNode::Attribute(AttributeNode {
                name: "id".into(),
                data_type: DataType::Int,
                nullable: false,
                source: None,
            })],
        }
    }

    #[test]
    fn fingerprint_tracks_structure() {
        let a = node(ModelFlag::Disabled);
        let b = node(ModelFlag::Disabled);
        let c = node(ModelFlag::Generic);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
        assert_eq!(a.attributes().count(), 1);
        assert_eq!(a.nodes().count(), 0);
    }
}
