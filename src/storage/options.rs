use std::sync::Arc;

use crate::storage::metrics::StorageMetrics;

/// Fixed capacity of an [`ArrayBundle`](crate::storage::ArrayBundle) in
/// (key, value) pairs.
pub const ARRAY_BUNDLE_CAPACITY: usize = 6;

/// Default initial array capacity of a
/// [`GrowingBundle`](crate::storage::GrowingBundle).
pub const DEFAULT_GROWING_CAPACITY: usize = 8;

/// Default array-size threshold past which a growing bundle promotes to its
/// map representation.
pub const DEFAULT_ARRAY_THRESHOLD: usize = 16;

/// Fallback capacity estimate when neither the options nor the layer supply
/// one.
pub const DEFAULT_CAPACITY_ESTIMATE: usize = 1000;

/// Configuration options supplied when constructing an annotation storage.
#[derive(Clone)]
pub struct StorageOptions {
    /// Whether the storage participates in item-slot recycling.
    ///
    /// A weak storage allows the owning driver to [`sweep`] entries for items
    /// whose arena slots were recycled; callers must not assume an item added
    /// once remains discoverable indefinitely under this mode. A strong
    /// storage keeps every entry until it is removed explicitly.
    ///
    /// [`sweep`]: crate::storage::ManagedAnnotationStorage::sweep
    pub weak_items: bool,
    /// Initial capacity of the backing item map, in entries.
    ///
    /// When unset, the storage asks the layer for an estimate at bind time
    /// and falls back to [`DEFAULT_CAPACITY_ESTIMATE`].
    pub initial_capacity: Option<usize>,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn StorageMetrics>>,
}

impl StorageOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            weak_items: false,
            initial_capacity: None,
            metrics: None,
        }
    }

    /// Enables or disables weak item handling.
    pub fn weak_items(mut self, enabled: bool) -> Self {
        self.weak_items = enabled;
        self
    }

    /// Sets the initial capacity of the backing item map.
    pub fn initial_capacity(mut self, entries: usize) -> Self {
        self.initial_capacity = Some(entries);
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Sizing configuration for per-item bundles in multi-key storage.
#[derive(Clone, Copy, Debug)]
pub struct BundleConfig {
    /// Initial capacity of array-backed bundle forms, in pairs.
    pub initial_capacity: usize,
    /// Array size past which a growing bundle promotes to map form.
    pub array_threshold: usize,
}

impl BundleConfig {
    /// Creates a config with the given initial array capacity.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            array_threshold: DEFAULT_ARRAY_THRESHOLD,
        }
    }

    /// Sets the promotion threshold.
    pub fn array_threshold(mut self, threshold: usize) -> Self {
        self.array_threshold = threshold;
        self
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_GROWING_CAPACITY,
            array_threshold: DEFAULT_ARRAY_THRESHOLD,
        }
    }
}
