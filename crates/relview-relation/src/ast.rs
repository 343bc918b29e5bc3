//! Relation -> canonical AST.

use relview_core::ast::{AstMeta, AttributeNode, HeaderNode, ModelFlag, RelationNode};
use relview_core::prelude::Result;

use crate::relation::Relation;

/// Build the AST for `relation` and, recursively, its nested children.
///
/// The emitted meta always names the live dataset; the model flag stays
/// `Disabled` unless auto-structuring is on or a model was set. Children are
/// represented as header nodes after the attributes, never as meta.
pub fn build_ast(relation: &Relation) -> Result<RelationNode> {
    let meta = relation.meta();

    let model = match &meta.model {
        Some(model) => ModelFlag::Custom(model.clone()),
        None if relation.auto_struct() => ModelFlag::Generic,
        None => ModelFlag::Disabled,
    };

    let attributes = if meta.is_wrap() {
        relation.schema().wrap_subset()
    } else {
        relation.schema().non_wrapped_subset()
    };

    let mut header: Vec<HeaderNode> = attributes
        .iter()
        .map(|a| HeaderNode::Attribute(AttributeNode::from(a)))
        .collect();
    for node in &meta.nodes {
        header.push(HeaderNode::Relation((*node.to_ast()?).clone()));
    }

    Ok(RelationNode {
        name: relation.name().to_string(),
        meta: AstMeta {
            dataset: relation.dataset().name().to_string(),
            model,
            join: meta.join.clone(),
        },
        header,
    })
}
