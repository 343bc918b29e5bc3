#![forbid(unsafe_code)]
//! relview-relation: relations over black-box datasets and their algebra.
//!
//! Design intent:
//! - A `Relation` never mutates; `new`/`with`/`wrap`/`map_to` return new values
//!   with fresh memo slots for the AST and compiled mapper.
//! - Nothing reads the dataset until `Materialize::each` is called.
//! - Wrap nests a child's whole output under a key; combine joins children on
//!   key pairs and yields a `Graph`; views may be curried; `Composite` queues
//!   steps and replays them lazily.

pub mod ast;
pub mod curried;
pub mod dataset;
pub mod graph;
pub mod materialize;
pub mod meta;
pub mod nest;
pub mod options;
pub mod pipeline;
pub mod relation;

pub use ast::build_ast;
pub use curried::{Applied, Curried, View};
pub use dataset::{Dataset, MemoryDataset, Restricted, TupleIter};
pub use graph::Graph;
pub use materialize::{Materialize, Rows};
pub use meta::Meta;
pub use nest::CombineSpec;
pub use options::Options;
pub use pipeline::{Composite, CompositeFactory, MapTarget, Pipeline, Step};
pub use relation::Relation;

pub mod prelude {
    pub use crate::{
        Applied, CombineSpec, Composite, Dataset, Graph, MapTarget, Materialize, MemoryDataset,
        Meta, Options, Pipeline, Relation, View,
    };
}
