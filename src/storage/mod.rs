//! Per-item annotation storage engine.
//!
//! Attaches an arbitrary, sparse set of typed key/value annotations to very
//! large numbers of corpus items while keeping memory overhead low. Multiple
//! interchangeable physical representations cover different sparsity/density
//! tradeoffs: flat single-key maps for dense one-key layers, per-item
//! bundles with adaptive layouts for sparse multi-key layers.

mod bundle;
mod contract;
mod metrics;
mod multi;
mod options;
mod single;
mod types;

/// Bundle representations for multi-key storage.
pub use bundle::{ArrayBundle, Bundle, GrowingBundle, HashBundle};

/// The storage contract and its managed lifecycle extension.
pub use contract::{AnnotationStorage, ManagedAnnotationStorage};

/// Metrics collection.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StorageMetrics};

/// Multi-key storage dispatch.
pub use multi::MultiKeyStorage;

/// Storage configuration.
pub use options::{
    BundleConfig, StorageOptions, ARRAY_BUNDLE_CAPACITY, DEFAULT_ARRAY_THRESHOLD,
    DEFAULT_CAPACITY_ESTIMATE, DEFAULT_GROWING_CAPACITY,
};

/// Single-key storages.
pub use single::{SingleKeyLongStorage, SingleKeyStringStorage};

/// The annotation value model.
pub use types::{AnnoValue, ObjectRef, ValueKind};
