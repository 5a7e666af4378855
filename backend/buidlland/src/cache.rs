//! Keyed entity caches.
//!
//! Owned by the composition root and handed to whoever needs them; there is
//! no process-wide cache. Clones share the same entries and hooks.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

type Hook<K> = Box<dyn Fn(&K) + Send + Sync>;

pub struct EntityCache<K, V> {
    name: &'static str,
    entries: Arc<DashMap<K, V>>,
    hooks: Arc<DashMap<usize, Hook<K>>>,
    next_hook: Arc<AtomicUsize>,
}

impl<K, V> Clone for EntityCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: self.entries.clone(),
            hooks: self.hooks.clone(),
            next_hook: self.next_hook.clone(),
        }
    }
}

impl<K, V> EntityCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(DashMap::new()),
            hooks: Arc::new(DashMap::new()),
            next_hook: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store `value`, replacing whatever was cached under `key`.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Drop `key` and notify every registered hook, whether or not the key
    /// was cached. Returns the dropped value.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, v)| v);
        debug!("{} cache: invalidated {:?}", self.name, key);
        for hook in self.hooks.iter() {
            (hook.value())(key);
        }
        removed
    }

    /// Invalidate every cached key matching `pred`. Returns how many went.
    pub fn invalidate_where(&self, pred: impl Fn(&K) -> bool) -> usize {
        let keys: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| pred(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.invalidate(key);
        }
        keys.len()
    }

    /// Run `hook` on every later explicit invalidation.
    pub fn on_invalidate<F>(&self, hook: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        let id = self.next_hook.fetch_add(1, Ordering::Relaxed);
        self.hooks.insert(id, Box::new(hook));
    }
}
