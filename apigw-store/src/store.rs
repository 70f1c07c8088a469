use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

/// An entity that can live in a [`Store`]: a primary key, and optionally a
/// composite secondary key (e.g. `name:version:context`) kept consistent
/// with the primary map under the same lock.
pub trait Keyed: Clone + Send + Sync + 'static {
    fn primary_key(&self) -> String;

    fn secondary_key(&self) -> Option<String> {
        None
    }
}

struct Inner<T> {
    // BTreeMap so get_all comes back ordered by primary key; translators
    // depend on that ordering for deterministic output.
    items: BTreeMap<String, T>,
    by_secondary: HashMap<String, String>,
}

/// Thread-safe map from primary key to entity with a monotonic resource
/// version counter. Writers are serialised per store; readers observe a
/// consistent snapshot. All operations are total: no blocking I/O happens
/// under the lock.
pub struct Store<T: Keyed> {
    inner: RwLock<Inner<T>>,
    version: AtomicI64,
}

impl<T: Keyed> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> Store<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner { items: BTreeMap::new(), by_secondary: HashMap::new() }),
            version: AtomicI64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.get(key).cloned()
    }

    /// Lookup through the composite index.
    pub fn get_by_ref(&self, secondary: &str) -> Option<T> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let primary = inner.by_secondary.get(secondary)?;
        inner.items.get(primary).cloned()
    }

    /// Insert or replace. Last writer wins; a collision on the composite key
    /// replaces the entity that previously held it.
    pub fn set(&self, value: T) {
        let primary = value.primary_key();
        let secondary = value.secondary_key();
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let inner = &mut *guard;

        // Drop a stale secondary mapping left by a previous version of this
        // entity.
        if let Some(old) = inner.items.get(&primary) {
            if let Some(old_sec) = old.secondary_key() {
                if Some(&old_sec) != secondary.as_ref() {
                    inner.by_secondary.remove(&old_sec);
                }
            }
        }
        if let Some(sec) = &secondary {
            if let Some(displaced) = inner.by_secondary.insert(sec.clone(), primary.clone()) {
                if displaced != primary {
                    inner.items.remove(&displaced);
                }
            }
        }
        inner.items.insert(primary, value);
    }

    /// Remove by primary key. Returns whether the key existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.items.remove(key) {
            Some(old) => {
                if let Some(sec) = old.secondary_key() {
                    inner.by_secondary.remove(&sec);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every entity matching the predicate; returns the removed
    /// primary keys. Used for cascade deletes (e.g. all API keys under an
    /// undeployed API).
    pub fn delete_where(&self, pred: impl Fn(&T) -> bool) -> Vec<String> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let doomed: Vec<String> =
            inner.items.iter().filter(|(_, v)| pred(v)).map(|(k, _)| k.clone()).collect();
        for key in &doomed {
            if let Some(old) = inner.items.remove(key) {
                if let Some(sec) = old.secondary_key() {
                    inner.by_secondary.remove(&sec);
                }
            }
        }
        doomed
    }

    /// Immutable snapshot of every entity, ordered by primary key.
    pub fn get_all(&self) -> Vec<T> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically advance the resource version and return the new value.
    pub fn increment_version(&self) -> i64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn version(&self) -> i64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        id: String,
        tuple: String,
        payload: u32,
    }

    impl Keyed for Item {
        fn primary_key(&self) -> String {
            self.id.clone()
        }

        fn secondary_key(&self) -> Option<String> {
            Some(self.tuple.clone())
        }
    }

    fn item(id: &str, tuple: &str, payload: u32) -> Item {
        Item { id: id.into(), tuple: tuple.into(), payload }
    }

    #[test]
    fn test_set_get_delete() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "a:v1", 1));
        assert_eq!(store.get("a").unwrap().payload, 1);
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "a:v1", 1));
        store.set(item("a", "a:v1", 2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().payload, 2);
    }

    #[test]
    fn test_composite_lookup() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "orders:v1:/orders", 1));
        assert_eq!(store.get_by_ref("orders:v1:/orders").unwrap().id, "a");
        assert!(store.get_by_ref("missing").is_none());
    }

    #[test]
    fn test_composite_collision_is_update() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "same:tuple", 1));
        store.set(item("b", "same:tuple", 2));
        // The colliding insert displaced the previous holder.
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_none());
        assert_eq!(store.get_by_ref("same:tuple").unwrap().id, "b");
    }

    #[test]
    fn test_secondary_index_follows_update() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "old:tuple", 1));
        store.set(item("a", "new:tuple", 2));
        assert!(store.get_by_ref("old:tuple").is_none());
        assert_eq!(store.get_by_ref("new:tuple").unwrap().payload, 2);
    }

    #[test]
    fn test_get_all_is_sorted_by_primary_key() {
        let store: Store<Item> = Store::new();
        store.set(item("c", "c:t", 3));
        store.set(item("a", "a:t", 1));
        store.set(item("b", "b:t", 2));
        let ids: Vec<String> = store.get_all().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_where_removes_matching_and_their_index() {
        let store: Store<Item> = Store::new();
        store.set(item("a", "a:t", 1));
        store.set(item("b", "b:t", 1));
        store.set(item("c", "c:t", 2));
        let removed = store.delete_where(|i| i.payload == 1);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get_by_ref("a:t").is_none());
        assert!(store.get_by_ref("c:t").is_some());
    }

    #[test]
    fn test_version_is_monotonic() {
        let store: Store<Item> = Store::new();
        assert_eq!(store.version(), 0);
        assert_eq!(store.increment_version(), 1);
        assert_eq!(store.increment_version(), 2);
        assert_eq!(store.version(), 2);
    }
}
