//! Open-ended facts a relation carries about itself.

use relview_core::ast::{Join, ModelRef};
use relview_core::schema::Cardinality;

use crate::relation::Relation;

#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Label recorded by callers; the AST always reports the live dataset name.
    pub dataset: Option<String>,
    /// Role relative to a parent: root, wrapped child, or combined child.
    pub join: Join,
    /// Custom model set through `map_to`/`map_with`.
    pub model: Option<ModelRef>,
    /// Wrapped and combined children, in attachment order.
    pub nodes: Vec<Relation>,
}

impl Meta {
    pub fn is_root(&self) -> bool {
        matches!(self.join, Join::Root)
    }

    pub fn is_wrap(&self) -> bool {
        matches!(self.join, Join::Wrap)
    }

    pub fn is_combine(&self) -> bool {
        matches!(self.join, Join::Combine { .. })
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match &self.join {
            Join::Combine { cardinality, .. } => Some(*cardinality),
            _ => None,
        }
    }
}
