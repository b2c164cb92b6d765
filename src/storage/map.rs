//! Chaining Hash Map with Incremental Rehashing
//!
//! A two-table hash map that never stops the world to grow. When the
//! primary table crosses the load-factor threshold it becomes the
//! secondary table, a fresh primary of double capacity is installed, and
//! every subsequent public operation migrates a bounded number of nodes
//! from secondary to primary. Worst-case latency per operation therefore
//! stays flat no matter how large the table gets, which is what keeps a
//! cooperative event loop responsive while the map grows.
//!
//! ## Design
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   HMap<T>                     │
//! │  ┌─────────────────┐   ┌──────────────────┐   │
//! │  │    primary      │   │ secondary (opt.) │   │
//! │  │ cap = 2 × sec.  │◀──│  draining, one   │   │
//! │  │ new inserts     │   │  cursor sweep    │   │
//! │  └─────────────────┘   └──────────────────┘   │
//! │            rehash cursor ──────▶              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Buckets are singly-linked chains of owned nodes. The map is generic
//! over the stored item; callers precompute a 64-bit hash and supply an
//! equality closure at the lookup boundary, so the same map serves any
//! entry type without wrapper allocations.
//!
//! Lookups consult the primary table first, then the secondary, so every
//! key stays reachable throughout a migration.

use std::mem;

/// Average chain length that triggers a rehash.
pub const LOAD_FACTOR: usize = 8;

/// Maximum node moves performed by one public operation.
pub const REHASH_WORK: usize = 128;

/// Capacity of the first primary table.
pub const INITIAL_CAPACITY: usize = 4;

type Link<T> = Option<Box<Node<T>>>;

struct Node<T> {
    hash: u64,
    item: T,
    next: Link<T>,
}

/// One chaining table: bucket heads, a power-of-two capacity mask, and a
/// live count.
struct Table<T> {
    buckets: Box<[Link<T>]>,
    mask: u64,
    len: usize,
}

impl<T> Table<T> {
    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity >= INITIAL_CAPACITY && capacity.is_power_of_two());
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, || None);
        Self {
            buckets: buckets.into_boxed_slice(),
            mask: (capacity - 1) as u64,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Pushes a node at the head of its chain. O(1).
    fn push(&mut self, mut node: Box<Node<T>>) {
        let idx = self.bucket_of(node.hash);
        node.next = self.buckets[idx].take();
        self.buckets[idx] = Some(node);
        self.len += 1;
    }

    fn find<F: Fn(&T) -> bool>(&self, hash: u64, eq: F) -> Option<&T> {
        let mut cur = self.buckets[self.bucket_of(hash)].as_deref();
        while let Some(node) = cur {
            if node.hash == hash && eq(&node.item) {
                return Some(&node.item);
            }
            cur = node.next.as_deref();
        }
        None
    }

    fn find_mut<F: Fn(&T) -> bool>(&mut self, hash: u64, eq: F) -> Option<&mut T> {
        let idx = self.bucket_of(hash);
        let mut cur = self.buckets[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.hash == hash && eq(&node.item) {
                return Some(&mut node.item);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    /// Unlinks and returns the matching node. O(1) once found.
    fn detach<F: Fn(&T) -> bool>(&mut self, hash: u64, eq: F) -> Option<Box<Node<T>>> {
        let idx = self.bucket_of(hash);
        let mut slot = &mut self.buckets[idx];
        loop {
            let found = match slot {
                Some(node) => node.hash == hash && eq(&node.item),
                None => return None,
            };
            if found {
                let mut node = slot.take()?;
                *slot = node.next.take();
                self.len -= 1;
                return Some(node);
            }
            slot = &mut slot.as_mut()?.next;
        }
    }
}

/// A hash map that grows by migrating at most [`REHASH_WORK`] entries per
/// public operation.
pub struct HMap<T> {
    primary: Table<T>,
    secondary: Option<Table<T>>,
    cursor: usize,
    moved: u64,
}

impl<T> HMap<T> {
    /// Creates an empty map with the initial capacity.
    pub fn new() -> Self {
        Self {
            primary: Table::with_capacity(INITIAL_CAPACITY),
            secondary: None,
            cursor: 0,
            moved: 0,
        }
    }

    /// Number of live entries across both tables.
    pub fn len(&self) -> usize {
        self.primary.len + self.secondary.as_ref().map_or(0, |t| t.len)
    }

    /// Returns true when the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while a migration is in progress.
    pub fn is_rehashing(&self) -> bool {
        self.secondary.is_some()
    }

    /// Cumulative node moves performed by rehash steps. Monotonic; the
    /// delta across one operation is bounded by [`REHASH_WORK`].
    pub fn rehash_moves(&self) -> u64 {
        self.moved
    }

    /// Returns the item whose precomputed hash matches and for which the
    /// comparator returns true, if any.
    pub fn get<F: Fn(&T) -> bool>(&mut self, hash: u64, eq: F) -> Option<&T> {
        self.rehash_step();
        if let Some(item) = self.primary.find(hash, &eq) {
            return Some(item);
        }
        self.secondary.as_ref().and_then(|t| t.find(hash, &eq))
    }

    /// Mutable variant of [`HMap::get`].
    pub fn get_mut<F: Fn(&T) -> bool>(&mut self, hash: u64, eq: F) -> Option<&mut T> {
        self.rehash_step();
        if self.primary.find(hash, &eq).is_some() {
            return self.primary.find_mut(hash, &eq);
        }
        self.secondary.as_mut().and_then(|t| t.find_mut(hash, &eq))
    }

    /// Inserts an item under a precomputed hash.
    ///
    /// The caller must ensure the item is not already present; the map
    /// does not deduplicate. Use [`HMap::get_mut`] for in-place updates.
    pub fn insert(&mut self, hash: u64, item: T) {
        self.primary.push(Box::new(Node {
            hash,
            item,
            next: None,
        }));
        if self.secondary.is_none() && self.primary.len >= self.primary.capacity() * LOAD_FACTOR {
            self.start_rehash();
        }
        self.rehash_step();
    }

    /// Detaches the matching item from whichever table holds it and hands
    /// it back to the caller.
    pub fn remove<F: Fn(&T) -> bool>(&mut self, hash: u64, eq: F) -> Option<T> {
        self.rehash_step();
        if let Some(node) = self.primary.detach(hash, &eq) {
            return Some(node.item);
        }
        self.secondary
            .as_mut()
            .and_then(|t| t.detach(hash, &eq))
            .map(|node| node.item)
    }

    fn start_rehash(&mut self) {
        let capacity = self.primary.capacity();
        let old = mem::replace(&mut self.primary, Table::with_capacity(capacity * 2));
        self.secondary = Some(old);
        self.cursor = 0;
    }

    /// Migrates up to [`REHASH_WORK`] nodes from secondary to primary.
    /// Empty-bucket skips do not count against the budget.
    fn rehash_step(&mut self) {
        let Some(secondary) = self.secondary.as_mut() else {
            return;
        };
        let mut moved = 0;
        while moved < REHASH_WORK && secondary.len > 0 {
            debug_assert!(self.cursor < secondary.capacity());
            let slot = &mut secondary.buckets[self.cursor];
            match slot.take() {
                None => self.cursor += 1,
                Some(mut node) => {
                    *slot = node.next.take();
                    secondary.len -= 1;
                    self.primary.push(node);
                    moved += 1;
                }
            }
        }
        self.moved += moved as u64;
        if secondary.len == 0 {
            self.secondary = None;
            self.cursor = 0;
        }
    }
}

impl<T> Default for HMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
