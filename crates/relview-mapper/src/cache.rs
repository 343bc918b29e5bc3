//! Mapper cache strategies keyed by AST content hash.
//!
//! Entries are immutable `Arc`s; a poisoned lock still guards consistent data
//! and its guard is recovered.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};

use lru::LruCache;
use relview_core::hash::Hash256;

use crate::compiler::CompiledMapper;

/// Concurrency-safe store of compiled mappers.
pub trait MapperCache: Send + Sync {
    fn get(&self, key: &Hash256) -> Option<Arc<CompiledMapper>>;

    /// Insert unless the key is already present; returns whichever mapper is
    /// cached afterwards so racing compilers converge on one instance.
    fn get_or_insert(&self, key: Hash256, mapper: Arc<CompiledMapper>) -> Arc<CompiledMapper>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);

    /// Stable strategy name for logs.
    fn strategy(&self) -> &'static str;
}

/// Grows for the whole process lifetime.
#[derive(Default)]
pub struct UnboundedMapperCache {
    entries: RwLock<HashMap<Hash256, Arc<CompiledMapper>>>,
}

impl UnboundedMapperCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapperCache for UnboundedMapperCache {
    fn get(&self, key: &Hash256) -> Option<Arc<CompiledMapper>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn get_or_insert(&self, key: Hash256, mapper: Arc<CompiledMapper>) -> Arc<CompiledMapper> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(entries.entry(key).or_insert(mapper))
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn strategy(&self) -> &'static str {
        "unbounded"
    }
}

/// Bounded cache evicting the least recently compiled/used shape.
pub struct LruMapperCache {
    entries: Mutex<LruCache<Hash256, Arc<CompiledMapper>>>,
}

impl LruMapperCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cap()
            .get()
    }
}

impl MapperCache for LruMapperCache {
    fn get(&self, key: &Hash256) -> Option<Arc<CompiledMapper>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn get_or_insert(&self, key: Hash256, mapper: Arc<CompiledMapper>) -> Arc<CompiledMapper> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(existing);
        }
        entries.put(key, Arc::clone(&mapper));
        mapper
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn strategy(&self) -> &'static str {
        "lru"
    }
}
