//! Convenient re-exports for downstream crates.

pub use crate::ast::{
    AstMeta, AttributeNode, HeaderNode, Join, Model, ModelFlag, ModelRef, RelationNode,
};
pub use crate::config::{CacheStrategy, RelviewConfig};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::schema::{
    Association, AssociationSet, Attribute, Cardinality, DataType, Schema, TupleTransform,
};
pub use crate::types::{Struct, Tuple, Value};
