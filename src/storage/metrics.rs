use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking annotation storage operations.
///
/// Implementations collect statistics about value reads and writes and about
/// item slot churn. The engine calls these hooks on its hot paths, so
/// implementations should stay allocation-free.
pub trait StorageMetrics: Send + Sync {
    /// Records a value read, typed or generic.
    fn value_read(&self);

    /// Records a value write, typed or generic.
    fn value_written(&self);

    /// Records the removal of a single value.
    fn value_cleared(&self);

    /// Records the reservation of an item slot.
    fn item_added(&self);

    /// Records the release of an item slot.
    fn item_removed(&self);
}

/// A no-op implementation of [`StorageMetrics`] that discards all recorded
/// metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn value_read(&self) {}
    fn value_written(&self) {}
    fn value_cleared(&self) {}
    fn item_added(&self) {}
    fn item_removed(&self) {}
}

/// A thread-safe counter-based implementation of [`StorageMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of value reads served.
    pub values_read: AtomicU64,

    /// Number of value writes applied.
    pub values_written: AtomicU64,

    /// Number of values removed.
    pub values_cleared: AtomicU64,

    /// Number of item slots reserved.
    pub items_added: AtomicU64,

    /// Number of item slots released.
    pub items_removed: AtomicU64,
}

impl StorageMetrics for CounterMetrics {
    fn value_read(&self) {
        self.values_read.fetch_add(1, Ordering::Relaxed);
    }

    fn value_written(&self) {
        self.values_written.fetch_add(1, Ordering::Relaxed);
    }

    fn value_cleared(&self) {
        self.values_cleared.fetch_add(1, Ordering::Relaxed);
    }

    fn item_added(&self) {
        self.items_added.fetch_add(1, Ordering::Relaxed);
    }

    fn item_removed(&self) {
        self.items_removed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default is [`NoopMetrics`], which has zero overhead.
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}
