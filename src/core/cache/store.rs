//! Bounded first-in-first-out store.
//!
//! Entries live in a fixed ring of slots with a key index beside it. Inserts
//! always land on the write cursor; once the ring is full the slot under the
//! cursor holds the oldest entry and is evicted. Lookups never reorder.

use std::collections::HashMap;
use std::hash::Hash;

struct Slot<K, V> {
    key: K,
    value: V,
}

/// Outcome of a [`FifoStore::put`]
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<K> {
    /// New key stored without evicting anything
    Inserted,
    /// Existing key updated in place; its insertion position is unchanged
    Replaced,
    /// New key stored after evicting the oldest entry
    Evicted(K),
    /// Store has zero capacity
    Discarded,
}

/// Insertion-ordered map with a hard capacity
pub struct FifoStore<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    index: HashMap<K, usize>,
    cursor: usize,
}

impl<K, V> FifoStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            index: HashMap::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|s| &s.value)
    }

    pub fn put(&mut self, key: K, value: V) -> PutOutcome<K> {
        if self.slots.is_empty() {
            return PutOutcome::Discarded;
        }

        if let Some(&slot) = self.index.get(&key) {
            if let Some(existing) = self.slots[slot].as_mut() {
                existing.value = value;
            }
            return PutOutcome::Replaced;
        }

        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len();

        let evicted = self.slots[slot].replace(Slot {
            key: key.clone(),
            value,
        });
        self.index.insert(key, slot);

        match evicted {
            Some(old) => {
                self.index.remove(&old.key);
                PutOutcome::Evicted(old.key)
            }
            None => PutOutcome::Inserted,
        }
    }

    /// Evict the oldest entry, if any
    pub fn evict_oldest(&mut self) -> Option<K> {
        let capacity = self.slots.len();
        if self.index.is_empty() {
            return None;
        }
        // The oldest entry is the first occupied slot at or after the cursor.
        for offset in 0..capacity {
            let slot = (self.cursor + offset) % capacity;
            if let Some(old) = self.slots[slot].take() {
                self.index.remove(&old.key);
                return Some(old.key);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.index.clear();
        self.cursor = 0;
    }

    /// Keys from oldest to newest
    pub fn keys_in_order(&self) -> Vec<K> {
        let capacity = self.slots.len();
        (0..capacity)
            .filter_map(|offset| {
                self.slots[(self.cursor + offset) % capacity]
                    .as_ref()
                    .map(|s| s.key.clone())
            })
            .collect()
    }
}
