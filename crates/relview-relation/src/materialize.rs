//! Lazy materialization shared by relations, graphs, curried views and
//! composites.

use std::sync::Arc;

use relview_core::ast::RelationNode;
use relview_core::prelude::{Result, Value};

/// Owned stream of materialized items (tuples or structs).
pub type Rows = Box<dyn Iterator<Item = Result<Value>>>;

pub trait Materialize {
    /// Start a fresh pass. Nothing touches the dataset before this call.
    fn each(&self) -> Result<Rows>;

    fn materialize(&self) -> Result<Vec<Value>> {
        self.each()?.collect()
    }

    fn to_ast(&self) -> Result<Arc<RelationNode>>;

    fn is_curried(&self) -> bool {
        false
    }

    fn is_graph(&self) -> bool {
        false
    }
}
