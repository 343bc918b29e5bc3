//! The dataset capability wrapped by every relation.
//!
//! A dataset is a black box that can produce raw tuples once per call. Errors
//! raised while producing them are passed through untranslated.
//!
//! - `MemoryDataset`: tuples held in memory (tests, fixtures, small lookups).
//! - `Restricted`: equality filter over another dataset, produced by
//!   `Relation::restrict`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use relview_core::hash::{hash_serde, hash_str, Hash256};
use relview_core::prelude::{Result, Tuple};

/// Owned, forward-only stream of raw tuples.
pub type TupleIter = Box<dyn Iterator<Item = Result<Tuple>>>;

pub trait Dataset: Send + Sync + fmt::Debug {
    /// Name reported in the relation AST.
    fn name(&self) -> &str;

    /// Identity used for relation equality: equal digests mean equal data.
    fn digest(&self) -> Hash256;

    /// Start a fresh pass over the raw tuples.
    fn tuples(&self) -> Result<TupleIter>;

    /// Escape hatch to the concrete dataset type.
    fn as_any(&self) -> &dyn Any;
}

/// Tuples held in memory behind an `Arc`, so every pass is a cheap clone.
#[derive(Clone)]
pub struct MemoryDataset {
    name: String,
    rows: Arc<Vec<Tuple>>,
    digest: Hash256,
}

impl MemoryDataset {
    pub fn new(name: impl Into<String>, rows: Vec<Tuple>) -> Self {
        let name = name.into();
        let digest = hash_serde(&(&name, &rows)).unwrap_or_else(|_| hash_str(&name));
        Self {
            name,
            rows: Arc::new(rows),
            digest,
        }
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Debug for MemoryDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDataset")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl Dataset for MemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn digest(&self) -> Hash256 {
        self.digest
    }

    fn tuples(&self) -> Result<TupleIter> {
        let rows = Arc::clone(&self.rows);
        Ok(Box::new((0..rows.len()).map(move |i| Ok(rows[i].clone()))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps the tuples of `inner` whose values equal every entry of `criteria`.
#[derive(Debug, Clone)]
pub struct Restricted {
    inner: Arc<dyn Dataset>,
    criteria: Tuple,
}

impl Restricted {
    pub fn new(inner: Arc<dyn Dataset>, criteria: Tuple) -> Self {
        Self { inner, criteria }
    }

    pub fn inner(&self) -> &Arc<dyn Dataset> {
        &self.inner
    }

    pub fn criteria(&self) -> &Tuple {
        &self.criteria
    }
}

impl Dataset for Restricted {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn digest(&self) -> Hash256 {
        let parent = self.inner.digest().to_hex();
        hash_serde(&(&parent, &self.criteria)).unwrap_or_else(|_| hash_str(&parent))
    }

    fn tuples(&self) -> Result<TupleIter> {
        let criteria = self.criteria.clone();
        let inner = self.inner.tuples()?;
        Ok(Box::new(inner.filter(move |row| match row {
            Ok(t) => criteria.iter().all(|(k, v)| t.get(k) == Some(v)),
            // Errors always reach the caller.
            Err(_) => true,
        })))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relview_core::tuple;

    #[test]
    fn memory_dataset_replays() {
        let ds = MemoryDataset::new("users", vec![tuple! { "id" => 1 }, tuple! { "id" => 2 }]);
        let first: Vec<_> = ds.tuples().unwrap().collect::<Result<_>>().unwrap();
        let second: Vec<_> = ds.tuples().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        let same = MemoryDataset::new("users", vec![tuple! { "id" => 1 }, tuple! { "id" => 2 }]);
        assert_eq!(ds.digest(), same.digest());
    }

    #[test]
    fn restricted_filters_by_equality() {
        let ds: Arc<dyn Dataset> = Arc::new(MemoryDataset::new(
            "tasks",
            vec![
                tuple! { "id" => 1, "user_id" => 1 },
                tuple! { "id" => 2, "user_id" => 2 },
                tuple! { "id" => 3, "user_id" => 1 },
            ],
        ));
        let r = Restricted::new(Arc::clone(&ds), tuple! { "user_id" => 1 });
        let ids: Vec<_> = r
            .tuples()
            .unwrap()
            .map(|t| t.unwrap().get("id").cloned())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(r.name(), "tasks");
        assert_ne!(r.digest(), ds.digest());
    }
}
