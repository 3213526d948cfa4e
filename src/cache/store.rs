//! Bounded least-recently-used store.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// Size accounting for cached values.
pub trait Weigh {
    /// Approximate heap bytes held by the value.
    fn weight(&self) -> usize;
}

impl Weigh for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weigh for crate::image::Bitmap {
    fn weight(&self) -> usize {
        self.byte_len()
    }
}

/// Entry and byte budget of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Capacity {
    pub const fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    weight: usize,
    tick: u64,
}

#[derive(Debug)]
struct StoreInner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency order: oldest tick first.
    order: BTreeMap<u64, K>,
    bytes: usize,
    next_tick: u64,
    stats: StoreStats,
}

impl<K, V> Default for StoreInner<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            bytes: 0,
            next_tick: 0,
            stats: StoreStats::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> StoreInner<K, V> {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        self.bytes -= entry.weight;
        Some(entry)
    }
}

/// Thread-safe LRU map bounded by entry count and total weight.
///
/// Values are handed out as `Arc`s, so a value returned by [`LruStore::get`]
/// stays valid after it is evicted.
#[derive(Debug)]
pub struct LruStore<K, V> {
    inner: Mutex<StoreInner<K, V>>,
    capacity: Capacity,
}

impl<K: Eq + Hash + Clone, V: Weigh> LruStore<K, V> {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub const fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Look up a value and mark it most recently used.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut guard = self.lock();
        let tick = guard.bump();
        let Some(entry) = guard.entries.get_mut(key) else {
            guard.stats.misses += 1;
            return None;
        };
        let old_tick = std::mem::replace(&mut entry.tick, tick);
        let value = Arc::clone(&entry.value);
        guard.order.remove(&old_tick);
        guard.order.insert(tick, key.clone());
        guard.stats.hits += 1;
        Some(value)
    }

    /// Check for a key without touching recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Insert a value, replacing any previous one, then evict down to
    /// capacity. Returns the number of entries evicted.
    ///
    /// A value heavier than the byte budget is not stored.
    pub fn insert(&self, key: K, value: V) -> usize {
        self.insert_arc(key, Arc::new(value))
    }

    pub fn insert_arc(&self, key: K, value: Arc<V>) -> usize {
        let weight = value.weight();
        let mut guard = self.lock();
        guard.remove(&key);
        if weight > self.capacity.max_bytes || self.capacity.max_entries == 0 {
            return 0;
        }

        let tick = guard.bump();
        guard.order.insert(tick, key.clone());
        guard.entries.insert(key, Entry {
            value,
            weight,
            tick,
        });
        guard.bytes += weight;

        let mut evicted = 0;
        while guard.entries.len() > self.capacity.max_entries
            || guard.bytes > self.capacity.max_bytes
        {
            let Some((_, oldest)) = guard.order.pop_first() else {
                break;
            };
            if let Some(entry) = guard.entries.remove(&oldest) {
                guard.bytes -= entry.weight;
                evicted += 1;
            }
        }
        guard.stats.evictions += evicted as u64;
        evicted
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.order.clear();
        guard.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total weight of stored values.
    pub fn weight(&self) -> usize {
        self.lock().bytes
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }
}
