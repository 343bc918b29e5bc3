#![forbid(unsafe_code)]
//! relview-mapper: compile relation ASTs into reusable tuple -> struct functions.
//!
//! Design intent:
//! - One compiled mapper per distinct AST shape; the cache key is the AST's
//!   content hash, never a relation instance.
//! - The cache is a replaceable strategy (`MapperCache`): unbounded for short
//!   lived processes, LRU for long-lived ones with many transient shapes.
//! - The registry holds caller-supplied named mappers for `map_with`.

pub mod cache;
pub mod compiler;
pub mod registry;

pub use cache::{LruMapperCache, MapperCache, UnboundedMapperCache};
pub use compiler::{CompiledMapper, MapperCompiler};
pub use registry::{Mapper, MapperRegistry};
