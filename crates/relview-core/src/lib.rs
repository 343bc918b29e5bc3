#![forbid(unsafe_code)]
//! relview-core: values, schemas, coercion transforms, AST nodes, hashing, config.
//!
//! Design intent:
//! - Pure data and pure functions; no dataset I/O lives here.
//! - The AST types are the contract between relations and any mapper compiler.
//! - Everything that feeds a cache key is `Serialize` so it can be content-hashed.

pub mod ast;
pub mod config;
pub mod error;
pub mod hash;
pub mod prelude;
pub mod schema;
pub mod trace;
pub mod types;

pub use error::{Error, Result};

/// Crate version, surfaced in diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
