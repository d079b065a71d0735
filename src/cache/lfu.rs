use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

#[cfg(test)]
#[path = "tests/lfu_tests.rs"]
mod lfu_tests;

/// Key/value cache evicting the entry with the smallest access frequency.
///
/// Entries live in an indexed binary min-heap ordered by `(frequency, admission sequence)` while a
/// [`HashMap`] tracks each key's position in the heap. Both structures are only ever touched
/// together under a single exclusive [`Mutex`]: [`LfuCache::get`] mutates the frequency counter
/// and therefore locks exactly like the writers do.
///
/// Ties at the minimum frequency are broken by admission order, the entry admitted first is
/// evicted first. The admission sequence is never refreshed by hits, so there is no recency
/// component and no decay: an entry that was hot long ago keeps its frequency until overtaken.
///
/// A capacity of `0` stores nothing.
///
/// Every [`LfuCache::delete`] and [`LfuCache::clear`] advances an invalidation generation, whether
/// or not an entry was present. A reader that fills the cache from a slower source captures
/// [`LfuCache::generation`] before reading and stores through [`LfuCache::set_if_unchanged`], so a
/// value read before an invalidation is never stored after it.
pub struct LfuCache<K, V> {
    capacity: usize,
    heap: Mutex<FreqHeap<K, V>>,
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Mutex::new(FreqHeap::with_capacity(capacity)),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a clone of the value stored under `key`, counting the lookup as a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut heap = self.heap.lock();
        let pos = heap.position_of(key)?;
        let pos = heap.bump(pos);
        Some(heap.slots[pos].value.clone())
    }

    /// Stores `value` under `key`.
    ///
    /// Overwriting an existing key counts as a hit. Admitting a new key into a full cache first
    /// evicts the least-frequently-used entry; the new entry starts with frequency 1.
    pub fn set(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.heap.lock().upsert(self.capacity, key, value);
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.heap.lock().generation
    }

    /// Like [`LfuCache::set`] but only if no invalidation happened since `generation` was read.
    ///
    /// Returns whether `value` was stored.
    pub fn set_if_unchanged(&self, key: K, value: V, generation: u64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let mut heap = self.heap.lock();
        if heap.generation != generation {
            return false;
        }
        heap.upsert(self.capacity, key, value);
        true
    }

    /// Removes `key` if present. A missing key leaves the entries untouched but still advances the
    /// invalidation generation.
    pub fn delete(&self, key: &K) {
        let mut heap = self.heap.lock();
        heap.generation = heap.generation.wrapping_add(1);
        if let Some(pos) = heap.position_of(key) {
            heap.remove_at(pos);
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut heap = self.heap.lock();
        heap.generation = heap.generation.wrapping_add(1);
        heap.slots.clear();
        heap.positions.clear();
    }
}

struct Slot<K, V> {
    key: K,
    value: V,
    freq: u64,
    seq: u64,
}

impl<K, V> Slot<K, V> {
    const fn rank(&self) -> (u64, u64) {
        (self.freq, self.seq)
    }
}

struct FreqHeap<K, V> {
    slots: Vec<Slot<K, V>>,
    positions: HashMap<K, usize>,
    next_seq: u64,
    generation: u64,
}

impl<K, V> FreqHeap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            next_seq: 0,
            generation: 0,
        }
    }

    fn position_of(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Overwrites `key` as a hit, or admits it after evicting the minimum when `capacity` is reached.
    fn upsert(&mut self, capacity: usize, key: K, value: V) {
        if let Some(pos) = self.position_of(&key) {
            self.slots[pos].value = value;
            self.bump(pos);
            return;
        }

        if self.slots.len() >= capacity {
            self.remove_at(0);
        }
        self.push(key, value);
    }

    fn push(&mut self, key: K, value: V) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let pos = self.slots.len();
        self.positions.insert(key.clone(), pos);
        self.slots.push(Slot {
            key,
            value,
            freq: 1,
            seq,
        });
        self.sift_up(pos);
    }

    /// Increments the frequency of the slot at `pos` and returns its new position.
    fn bump(&mut self, pos: usize) -> usize {
        self.slots[pos].freq = self.slots[pos].freq.saturating_add(1);
        // A larger rank can only move the slot towards the leaves.
        self.sift_down(pos)
    }

    fn remove_at(&mut self, pos: usize) -> Option<Slot<K, V>> {
        let last = self.slots.len().checked_sub(1)?;
        self.swap(pos, last);
        let removed = self.slots.pop()?;
        self.positions.remove(&removed.key);

        if pos < self.slots.len() {
            let pos = self.sift_up(pos);
            self.sift_down(pos);
        }
        Some(removed)
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.slots[pos].rank() >= self.slots[parent].rank() {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) -> usize {
        let len = self.slots.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < len && self.slots[left].rank() < self.slots[smallest].rank() {
                smallest = left;
            }
            if right < len && self.slots[right].rank() < self.slots[smallest].rank() {
                smallest = right;
            }
            if smallest == pos {
                return pos;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.slots.swap(a, b);
        if let Some(pos) = self.positions.get_mut(&self.slots[a].key) {
            *pos = a;
        }
        if let Some(pos) = self.positions.get_mut(&self.slots[b].key) {
            *pos = b;
        }
    }
}

#[cfg(test)]
impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Frequency of `key` without counting the lookup as a hit.
    fn frequency(&self, key: &K) -> Option<u64> {
        let heap = self.heap.lock();
        heap.position_of(key).map(|pos| heap.slots[pos].freq)
    }

    /// Checks that the position index and the heap agree and that the heap property holds.
    fn is_consistent(&self) -> bool {
        let heap = self.heap.lock();
        if heap.positions.len() != heap.slots.len() {
            return false;
        }
        heap.slots.iter().enumerate().all(|(pos, slot)| {
            let indexed = heap.positions.get(&slot.key) == Some(&pos);
            let ordered = pos == 0 || heap.slots[(pos - 1) / 2].rank() <= slot.rank();
            indexed && ordered
        })
    }
}
