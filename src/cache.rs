use std::collections::HashMap;
use std::sync::{Arc, Weak};

use anyhow::Result;

/// Name-keyed cache of shared resources that only holds weak references.
///
/// A resource is generated at most once while anyone holds it, and is freed
/// as soon as the last strong handle drops. Dead entries are noticed lazily
/// on the next lookup, or in bulk by [`ResourceCache::purge`].
pub struct ResourceCache<T> {
    entries: HashMap<String, Weak<T>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live resource for `name`, or generate and cache a new one.
    pub fn get(&mut self, name: &str, generate: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        if let Some(live) = self.entries.get(name).and_then(Weak::upgrade) {
            return Ok(live);
        }
        let fresh = Arc::new(generate()?);
        self.entries.insert(name.to_owned(), Arc::downgrade(&fresh));
        Ok(fresh)
    }

    /// Drop entries whose resource has been freed.
    pub fn purge(&mut self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of cached resources still alive.
    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|w| w.strong_count() > 0).count()
    }
}
