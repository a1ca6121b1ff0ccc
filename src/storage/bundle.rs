//! Per-item bundles: the unit of storage in multi-key mode.
//!
//! A bundle holds the (key, value) pairs of exactly one item. Three
//! representations cover the sparsity spectrum:
//!
//! - [`ArrayBundle`]: a fixed-capacity flat array scanned linearly, for
//!   layers with a small, fixed annotation set. No growth path: an insert
//!   into a full bundle is rejected and reported to the caller.
//! - [`GrowingBundle`]: starts as an array, doubles its capacity while it
//!   stays under the promotion threshold, then promotes itself to a hash map
//!   in one shot. Promotion is one-way.
//! - [`HashBundle`]: a hash map unconditionally, for layers known to carry
//!   many distinct keys per item.
//!
//! Absence is represented by a key simply not occurring; no representation
//! ever stores an absent value as a real entry. Key order is never
//! guaranteed: the array forms happen to visit keys in insertion order, the
//! map forms in whatever order the hash map provides.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::storage::options::{BundleConfig, ARRAY_BUNDLE_CAPACITY, DEFAULT_GROWING_CAPACITY};
use crate::storage::types::AnnoValue;

type Entry = (Arc<str>, AnnoValue);
type KeyMap = FxHashMap<Arc<str>, AnnoValue>;

/// Storage contract satisfied by every bundle representation.
pub trait Bundle {
    /// Creates a fresh, empty bundle sized per `config`.
    fn create(config: &BundleConfig) -> Self
    where
        Self: Sized;

    /// Returns the value stored under `key`, if any.
    fn value(&self, key: &str) -> Option<&AnnoValue>;

    /// Returns a mutable handle on the value stored under `key`, if any.
    fn value_mut(&mut self, key: &str) -> Option<&mut AnnoValue>;

    /// Sets (`Some`) or removes (`None`) the value under `key`.
    ///
    /// Returns whether the bundle changed. A fixed-capacity representation
    /// reports `false` for an insert it cannot hold, leaving existing
    /// entries intact.
    fn set_value(&mut self, key: &str, value: Option<AnnoValue>) -> bool;

    /// Returns the slot under `key`, inserting `default` first if absent.
    ///
    /// Returns `None` only when the representation is full and cannot admit
    /// the new key.
    fn get_or_try_insert(&mut self, key: &str, default: AnnoValue) -> Option<&mut AnnoValue>;

    /// Visits every stored key; returns whether any key was visited.
    fn collect_keys(&self, visit: &mut dyn FnMut(&str)) -> bool;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns whether the bundle holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn scan(entries: &[Entry], key: &str) -> Option<usize> {
    entries.iter().position(|(k, _)| &**k == key)
}

// ============================================================================
// ArrayBundle
// ============================================================================

/// Fixed-capacity array of (key, value) entries, scanned linearly.
///
/// Entries stay inline up to [`ARRAY_BUNDLE_CAPACITY`] pairs, so a
/// default-sized bundle costs no heap allocation of its own.
#[derive(Debug)]
pub struct ArrayBundle {
    entries: SmallVec<[Entry; ARRAY_BUNDLE_CAPACITY]>,
    capacity: usize,
}

impl ArrayBundle {
    /// Creates a bundle with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(ARRAY_BUNDLE_CAPACITY)
    }

    /// Creates a bundle holding at most `capacity` pairs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SmallVec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Maximum number of pairs this bundle can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ArrayBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundle for ArrayBundle {
    fn create(config: &BundleConfig) -> Self {
        Self::with_capacity(config.initial_capacity)
    }

    fn value(&self, key: &str) -> Option<&AnnoValue> {
        scan(&self.entries, key).map(|pos| &self.entries[pos].1)
    }

    fn value_mut(&mut self, key: &str) -> Option<&mut AnnoValue> {
        scan(&self.entries, key).map(|pos| &mut self.entries[pos].1)
    }

    fn set_value(&mut self, key: &str, value: Option<AnnoValue>) -> bool {
        match value {
            Some(value) => {
                if let Some(pos) = scan(&self.entries, key) {
                    self.entries[pos].1 = value;
                    return true;
                }
                if self.entries.len() == self.capacity {
                    return false;
                }
                self.entries.push((Arc::from(key), value));
                true
            }
            None => match scan(&self.entries, key) {
                Some(pos) => {
                    self.entries.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    fn get_or_try_insert(&mut self, key: &str, default: AnnoValue) -> Option<&mut AnnoValue> {
        if scan(&self.entries, key).is_none() && !self.set_value(key, Some(default)) {
            return None;
        }
        self.value_mut(key)
    }

    fn collect_keys(&self, visit: &mut dyn FnMut(&str)) -> bool {
        for (key, _) in &self.entries {
            visit(key);
        }
        !self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// GrowingBundle
// ============================================================================

/// Adaptive bundle: array form below the threshold, map form above.
///
/// Writes follow the array algorithm while the entry count stays within the
/// current capacity. An insert past the capacity doubles the array while the
/// doubled size stays within the threshold; once doubling would cross it,
/// the bundle copies every pair into a hash map, discards the array and
/// applies the pending write to the map. A promoted bundle never reverts to
/// array form, regardless of later deletions.
#[derive(Debug)]
pub struct GrowingBundle {
    repr: GrowingRepr,
    capacity: usize,
    threshold: usize,
}

#[derive(Debug)]
enum GrowingRepr {
    Array(SmallVec<[Entry; DEFAULT_GROWING_CAPACITY]>),
    Map(KeyMap),
}

impl GrowingBundle {
    /// Creates a bundle with the default capacity and threshold.
    pub fn new() -> Self {
        Self::create(&BundleConfig::default())
    }

    /// Returns whether the bundle has promoted to its map representation.
    pub fn is_map_backed(&self) -> bool {
        matches!(self.repr, GrowingRepr::Map(_))
    }

    /// Current array capacity; meaningless once promoted.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn promote(&mut self) {
        let entries = match std::mem::replace(&mut self.repr, GrowingRepr::Map(KeyMap::default()))
        {
            GrowingRepr::Array(entries) => entries,
            GrowingRepr::Map(map) => {
                self.repr = GrowingRepr::Map(map);
                return;
            }
        };
        let mut map = KeyMap::with_capacity_and_hasher(entries.len() * 2, Default::default());
        for (key, value) in entries {
            map.insert(key, value);
        }
        trace!(len = map.len(), threshold = self.threshold, "bundle.promote");
        self.repr = GrowingRepr::Map(map);
    }

    fn insert(&mut self, key: &str, value: AnnoValue) {
        let entries = match &mut self.repr {
            GrowingRepr::Map(map) => {
                map.insert(Arc::from(key), value);
                return;
            }
            GrowingRepr::Array(entries) => entries,
        };
        if let Some(pos) = scan(entries, key) {
            entries[pos].1 = value;
            return;
        }
        if entries.len() < self.capacity {
            entries.push((Arc::from(key), value));
            return;
        }
        let doubled = self.capacity.saturating_mul(2);
        if doubled <= self.threshold {
            self.capacity = doubled;
            entries.push((Arc::from(key), value));
            return;
        }
        self.promote();
        if let GrowingRepr::Map(map) = &mut self.repr {
            map.insert(Arc::from(key), value);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match &mut self.repr {
            GrowingRepr::Array(entries) => match scan(entries, key) {
                Some(pos) => {
                    entries.remove(pos);
                    true
                }
                None => false,
            },
            GrowingRepr::Map(map) => {
                let removed = map.remove(key).is_some();
                if removed && map.len() < self.threshold {
                    // Promotion is one-way; the map stays even when the
                    // bundle shrinks back under the threshold.
                    trace!(
                        len = map.len(),
                        threshold = self.threshold,
                        "bundle.shrink_check"
                    );
                }
                removed
            }
        }
    }
}

impl Default for GrowingBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundle for GrowingBundle {
    fn create(config: &BundleConfig) -> Self {
        Self {
            repr: GrowingRepr::Array(SmallVec::new()),
            capacity: config.initial_capacity.max(1),
            threshold: config.array_threshold.max(1),
        }
    }

    fn value(&self, key: &str) -> Option<&AnnoValue> {
        match &self.repr {
            GrowingRepr::Array(entries) => scan(entries, key).map(|pos| &entries[pos].1),
            GrowingRepr::Map(map) => map.get(key),
        }
    }

    fn value_mut(&mut self, key: &str) -> Option<&mut AnnoValue> {
        match &mut self.repr {
            GrowingRepr::Array(entries) => match scan(entries, key) {
                Some(pos) => Some(&mut entries[pos].1),
                None => None,
            },
            GrowingRepr::Map(map) => map.get_mut(key),
        }
    }

    fn set_value(&mut self, key: &str, value: Option<AnnoValue>) -> bool {
        match value {
            Some(value) => {
                self.insert(key, value);
                true
            }
            None => self.remove(key),
        }
    }

    fn get_or_try_insert(&mut self, key: &str, default: AnnoValue) -> Option<&mut AnnoValue> {
        if self.value(key).is_none() {
            self.insert(key, default);
        }
        self.value_mut(key)
    }

    fn collect_keys(&self, visit: &mut dyn FnMut(&str)) -> bool {
        match &self.repr {
            GrowingRepr::Array(entries) => {
                for (key, _) in entries {
                    visit(key);
                }
                !entries.is_empty()
            }
            GrowingRepr::Map(map) => {
                for key in map.keys() {
                    visit(key);
                }
                !map.is_empty()
            }
        }
    }

    fn len(&self) -> usize {
        match &self.repr {
            GrowingRepr::Array(entries) => entries.len(),
            GrowingRepr::Map(map) => map.len(),
        }
    }
}

// ============================================================================
// HashBundle
// ============================================================================

/// Map-backed bundle with no threshold logic.
#[derive(Debug, Default)]
pub struct HashBundle {
    entries: KeyMap,
}

impl HashBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Bundle for HashBundle {
    fn create(config: &BundleConfig) -> Self {
        Self {
            entries: KeyMap::with_capacity_and_hasher(config.initial_capacity, Default::default()),
        }
    }

    fn value(&self, key: &str) -> Option<&AnnoValue> {
        self.entries.get(key)
    }

    fn value_mut(&mut self, key: &str) -> Option<&mut AnnoValue> {
        self.entries.get_mut(key)
    }

    fn set_value(&mut self, key: &str, value: Option<AnnoValue>) -> bool {
        match value {
            Some(value) => {
                self.entries.insert(Arc::from(key), value);
                true
            }
            None => self.entries.remove(key).is_some(),
        }
    }

    fn get_or_try_insert(&mut self, key: &str, default: AnnoValue) -> Option<&mut AnnoValue> {
        Some(self.entries.entry(Arc::from(key)).or_insert(default))
    }

    fn collect_keys(&self, visit: &mut dyn FnMut(&str)) -> bool {
        for key in self.entries.keys() {
            visit(key);
        }
        !self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
