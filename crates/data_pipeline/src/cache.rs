//! Thread-safe bounded LRU cache.
//!
//! A `HashMap` index over a slab-allocated doubly-linked recency list:
//! the list head is the most recently used entry, the tail the least, and
//! every key in the map points at exactly one list slot. Eviction removes
//! from the tail. All operations take `&self` and serialize on one internal
//! mutex.
//!
//! `get_or_load` deliberately holds that mutex across the loader so that
//! concurrent misses on the same key collapse into a single load. The
//! trade-off is that a slow loader blocks unrelated keys for its duration;
//! callers with slow loaders who care about cache-lock fairness should use
//! separate `get`/`put` and deduplicate at the application level, which is
//! what the pipeline engine itself does.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

/// Sentinel index for "no slot".
const NIL: usize = usize::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

struct Inner<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn slot(&self, idx: usize) -> &Slot<K, V> {
        self.slots[idx].as_ref().expect("occupied slot")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot<K, V> {
        self.slots[idx].as_mut().expect("occupied slot")
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slot(idx);
            (slot.prev, slot.next)
        };
        if prev != NIL {
            self.slot_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slot_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slot_mut(idx);
            slot.prev = NIL;
            slot.next = old_head;
        }
        if old_head != NIL {
            self.slot_mut(old_head).prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    /// Promotes an existing slot to the most-recently-used position.
    fn touch(&mut self, idx: usize) {
        if self.head != idx {
            self.detach(idx);
            self.attach_front(idx);
        }
    }

    fn remove_slot(&mut self, idx: usize) {
        self.detach(idx);
        let slot = self.slots[idx].take().expect("occupied slot");
        self.map.remove(&slot.key);
        self.free.push(idx);
    }

    fn evict_tail(&mut self) {
        if self.tail != NIL {
            self.remove_slot(self.tail);
        }
    }

    /// Insert-or-replace. Replacing an existing key promotes it and never
    /// triggers eviction; a genuinely new key evicts the tail first when the
    /// cache is full.
    fn put_slot(&mut self, key: K, value: V) {
        if let Some(idx) = self.map.get(&key).copied() {
            self.slot_mut(idx).value = value;
            self.touch(idx);
            return;
        }
        if self.capacity == 0 {
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_tail();
        }
        let slot = Slot {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.attach_front(idx);
        self.map.insert(key, idx);
    }

    #[cfg(test)]
    fn recency_keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut idx = self.head;
        while idx != NIL {
            let slot = self.slot(idx);
            keys.push(slot.key.clone());
            idx = slot.next;
        }
        keys
    }
}

/// Capacity-bounded LRU mapping from `K` to `V`.
///
/// `V` is handed out by value, so it should be cheap to clone; wrap large
/// payloads in `Arc` (the pipeline engine caches `Arc<DataItem>`).
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries. A capacity of 0
    /// stores nothing (every lookup misses).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                map: HashMap::new(),
                slots: Vec::new(),
                free: Vec::new(),
                head: NIL,
                tail: NIL,
            }),
        }
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let idx = *inner.map.get(key)?;
        inner.touch(idx);
        Some(inner.slot(idx).value.clone())
    }

    /// Inserts or replaces `key`, evicting the least-recently-used entry if
    /// a new key would exceed capacity.
    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put_slot(key, value);
    }

    /// Membership test that does not promote the entry.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    /// Removes `key` if present, returning whether it was.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        match inner.map.get(key).copied() {
            Some(idx) => {
                inner.remove_slot(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.slots.clear();
        inner.free.clear();
        inner.head = NIL;
        inner.tail = NIL;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Updates the capacity, evicting from the least-recently-used end until
    /// the cache fits.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = capacity;
        while inner.map.len() > capacity {
            inner.evict_tail();
        }
    }

    /// Returns the cached value for `key`, or invokes `load` and caches the
    /// result. The internal lock is held across `load`, so concurrent misses
    /// on the same key observe exactly one load. A failed load inserts
    /// nothing and the error is returned unchanged.
    pub fn get_or_load<F>(&self, key: K, load: F) -> Result<V>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.map.get(&key).copied() {
            inner.touch(idx);
            return Ok(inner.slot(idx).value.clone());
        }
        let value = load(&key)?;
        inner.put_slot(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod cache_test {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_lru_eviction_order() {
        let cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_recency_list_matches_access_order() {
        let cache = LruCache::new(3);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.inner.lock().recency_keys(), vec!["c", "b", "a"]);

        cache.get(&"a");
        assert_eq!(cache.inner.lock().recency_keys(), vec!["a", "c", "b"]);

        // contains must not promote
        cache.contains(&"b");
        assert_eq!(cache.inner.lock().recency_keys(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_replace_promotes_without_eviction() {
        let cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = LruCache::new(4);
        cache.put("a", 1);
        cache.put("b", 2);

        assert!(cache.remove(&"a"));
        assert!(!cache.remove(&"a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_set_capacity_evicts_lru_first() {
        let cache = LruCache::new(4);
        for key in ["a", "b", "c", "d"] {
            cache.put(key, key.len());
        }
        cache.get(&"b");
        // recency is now b, d, c, a
        cache.set_capacity(2);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"d"));
        assert!(!cache.contains(&"a"));
        assert!(!cache.contains(&"c"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = LruCache::new(0);
        cache.put("a", 1);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&"a"), None);

        let value = cache.get_or_load("a", |_| Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_get_or_load_caches_and_propagates_errors() {
        let cache: LruCache<&str, usize> = LruCache::new(4);

        let value = cache.get_or_load("abcd", |key| Ok(key.len())).unwrap();
        assert_eq!(value, 4);
        // second call must not invoke the loader
        let value = cache
            .get_or_load("abcd", |_| Err(anyhow!("must not run")))
            .unwrap();
        assert_eq!(value, 4);

        let failed: Result<usize> = cache.get_or_load("oops", |_| Err(anyhow!("boom")));
        assert!(failed.is_err());
        assert!(!cache.contains(&"oops"));
    }

    #[test]
    fn test_slot_reuse_after_eviction() {
        let cache = LruCache::new(2);
        for round in 0..10usize {
            cache.put(round, round * 2);
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&9), Some(18));
        assert_eq!(cache.get(&8), Some(16));
        assert_eq!(cache.get(&0), None);
    }
}
