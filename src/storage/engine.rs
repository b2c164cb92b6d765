//! Byte-String Store
//!
//! The store maps binary keys to binary values on top of the
//! incrementally-rehashed [`HMap`]. It is the single-owner heart of the
//! server: one store, one thread, no locks. Entries are owned by the map
//! from insert until detach; `remove` hands the detached entry back to
//! the caller, which drops it.
//!
//! Every operation hashes the key once with [`DefaultHasher`] and probes
//! the map with a key-equality closure, so the same 64-bit hash is used
//! for a given key everywhere.

use bytes::Bytes;
use std::hash::{DefaultHasher, Hasher};

use crate::storage::map::HMap;

/// A stored key-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The key this entry is filed under.
    pub key: Bytes,
    /// The current value.
    pub value: Bytes,
}

/// Hashes raw key bytes to the 64-bit value used for bucket placement.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(key);
    hasher.finish()
}

/// Operation counters. The process is single-threaded, so plain integers
/// suffice.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreStats {
    /// Total GET operations
    pub get_count: u64,
    /// Total SET operations
    pub set_count: u64,
    /// Total DEL operations
    pub del_count: u64,
}

/// The in-memory key-value store.
///
/// # Example
///
/// ```
/// use framekv::storage::Store;
/// use bytes::Bytes;
///
/// let mut store = Store::new();
/// store.set(Bytes::from("name"), Bytes::from("frame"));
/// assert_eq!(store.get(b"name"), Some(Bytes::from("frame")));
/// assert!(store.remove(b"name").is_some());
/// assert_eq!(store.get(b"name"), None);
/// ```
#[derive(Default)]
pub struct Store {
    map: HMap<Entry>,
    stats: StoreStats,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up a key and returns its value.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.stats.get_count += 1;
        let hash = hash_key(key);
        self.map
            .get(hash, |entry| entry.key.as_ref() == key)
            .map(|entry| entry.value.clone())
    }

    /// Upserts: replaces the value in place when the key exists, inserts a
    /// fresh entry otherwise.
    pub fn set(&mut self, key: Bytes, value: Bytes) {
        self.stats.set_count += 1;
        let hash = hash_key(&key);
        if let Some(entry) = self.map.get_mut(hash, |entry| entry.key == key) {
            entry.value = value;
            return;
        }
        self.map.insert(hash, Entry { key, value });
    }

    /// Detaches a key and returns the entry that held it.
    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        self.stats.del_count += 1;
        let hash = hash_key(key);
        self.map.remove(hash, |entry| entry.key.as_ref() == key)
    }

    /// Operation counters.
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Cumulative rehash node-moves, for latency instrumentation.
    pub fn rehash_moves(&self) -> u64 {
        self.map.rehash_moves()
    }

    /// Returns true while the underlying map is migrating.
    pub fn is_rehashing(&self) -> bool {
        self.map.is_rehashing()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.map.len())
            .field("rehashing", &self.map.is_rehashing())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_an_empty_store_misses() {
        let mut store = Store::new();
        assert_eq!(store.get(b"x"), None);
    }

    #[test]
    fn set_then_get() {
        let mut store = Store::new();
        store.set(Bytes::from("x"), Bytes::from("1"));
        assert_eq!(store.get(b"x"), Some(Bytes::from("1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut store = Store::new();
        store.set(Bytes::from("x"), Bytes::from("1"));
        store.set(Bytes::from("x"), Bytes::from("2"));
        assert_eq!(store.get(b"x"), Some(Bytes::from("2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_detaches_the_entry() {
        let mut store = Store::new();
        store.set(Bytes::from("x"), Bytes::from("1"));
        let entry = store.remove(b"x").unwrap();
        assert_eq!(entry.key, Bytes::from("x"));
        assert_eq!(entry.value, Bytes::from("1"));
        assert_eq!(store.get(b"x"), None);
        assert!(store.remove(b"x").is_none());
    }

    #[test]
    fn binary_keys_and_values() {
        let mut store = Store::new();
        let key = Bytes::from(&b"k\x00ey"[..]);
        let value = Bytes::from(&b"\xff\x00value"[..]);
        store.set(key.clone(), value.clone());
        assert_eq!(store.get(&key), Some(value));
    }

    #[test]
    fn survives_growth_past_several_rehashes() {
        let mut store = Store::new();
        for i in 0..10_000u32 {
            store.set(
                Bytes::from(format!("key:{i}")),
                Bytes::from(format!("value:{i}")),
            );
        }
        assert_eq!(store.len(), 10_000);
        assert!(store.rehash_moves() > 0);
        for i in 0..10_000u32 {
            assert_eq!(
                store.get(format!("key:{i}").as_bytes()),
                Some(Bytes::from(format!("value:{i}")))
            );
        }
    }

    #[test]
    fn stats_count_operations() {
        let mut store = Store::new();
        store.set(Bytes::from("a"), Bytes::from("1"));
        store.get(b"a");
        store.get(b"missing");
        store.remove(b"a");
        let stats = store.stats();
        assert_eq!(stats.set_count, 1);
        assert_eq!(stats.get_count, 2);
        assert_eq!(stats.del_count, 1);
    }
}
