//! The contract every annotation storage implementation satisfies.
//!
//! [`AnnotationStorage`] carries the value surface: generic and typed
//! accessors, key enumeration, presence checks and bulk clearing. Every typed
//! accessor has a default implementation that fails with
//! [`LemmaError::Unsupported`] naming the requested type and key, so a
//! concrete storage exposes exactly the type surface it meaningfully
//! supports and nothing reads back a silently wrong value.
//!
//! [`ManagedAnnotationStorage`] adds the lifecycle: binding to a layer
//! (which allocates the backing map and resolves no-entry defaults) and
//! per-item slot reservation independent of value presence.

use std::sync::Arc;

use tracing::debug;

use crate::error::{unsupported_get, unsupported_set, LemmaError, Result};
use crate::layer::AnnotationLayer;
use crate::storage::metrics::{default_metrics, StorageMetrics};
use crate::storage::options::{StorageOptions, DEFAULT_CAPACITY_ESTIMATE};
use crate::storage::types::AnnoValue;
use crate::types::{ItemId, LayerId};

/// Typed and generic access to per-item annotation values.
pub trait AnnotationStorage {
    /// Returns the effective value for `(item, key)`.
    ///
    /// Storages with a declared no-entry default report that default for
    /// absent entries; storages without one report `None`.
    fn value(&self, item: ItemId, key: &str) -> Result<Option<AnnoValue>>;

    /// Sets or clears (`None`) the value for `(item, key)`.
    ///
    /// Writing a value equal to the storage's no-entry default is equivalent
    /// to clearing. Returns whether the storage changed.
    fn set_value(&mut self, item: ItemId, key: &str, value: Option<AnnoValue>) -> Result<bool>;

    /// Returns the string value for `(item, key)`.
    fn string_value(&self, item: ItemId, key: &str) -> Result<Option<Arc<str>>> {
        let _ = item;
        Err(unsupported_get("string", key))
    }

    /// Returns the 32-bit integer value for `(item, key)`.
    fn integer_value(&self, item: ItemId, key: &str) -> Result<i32> {
        let _ = item;
        Err(unsupported_get("integer", key))
    }

    /// Returns the 64-bit integer value for `(item, key)`.
    fn long_value(&self, item: ItemId, key: &str) -> Result<i64> {
        let _ = item;
        Err(unsupported_get("long", key))
    }

    /// Returns the 32-bit float value for `(item, key)`.
    fn float_value(&self, item: ItemId, key: &str) -> Result<f32> {
        let _ = item;
        Err(unsupported_get("float", key))
    }

    /// Returns the 64-bit float value for `(item, key)`.
    fn double_value(&self, item: ItemId, key: &str) -> Result<f64> {
        let _ = item;
        Err(unsupported_get("double", key))
    }

    /// Returns the boolean value for `(item, key)`.
    fn boolean_value(&self, item: ItemId, key: &str) -> Result<bool> {
        let _ = item;
        Err(unsupported_get("boolean", key))
    }

    /// Sets or clears (`None`) the string value for `(item, key)`.
    fn set_string_value(&mut self, item: ItemId, key: &str, value: Option<Arc<str>>) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("string", key))
    }

    /// Sets the 32-bit integer value for `(item, key)`.
    fn set_integer_value(&mut self, item: ItemId, key: &str, value: i32) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("integer", key))
    }

    /// Sets the 64-bit integer value for `(item, key)`.
    fn set_long_value(&mut self, item: ItemId, key: &str, value: i64) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("long", key))
    }

    /// Sets the 32-bit float value for `(item, key)`.
    fn set_float_value(&mut self, item: ItemId, key: &str, value: f32) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("float", key))
    }

    /// Sets the 64-bit float value for `(item, key)`.
    fn set_double_value(&mut self, item: ItemId, key: &str, value: f64) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("double", key))
    }

    /// Sets the boolean value for `(item, key)`.
    fn set_boolean_value(&mut self, item: ItemId, key: &str, value: bool) -> Result<()> {
        let _ = (item, value);
        Err(unsupported_set("boolean", key))
    }

    /// Returns whether any item carries any meaningful value.
    fn has_annotations(&self) -> bool {
        false
    }

    /// Returns whether `item` carries any meaningful value.
    fn item_has_annotations(&self, item: ItemId) -> bool {
        let _ = item;
        false
    }

    /// Visits every key with a non-absent value for `item`.
    ///
    /// Returns whether any key was visited. No key order is guaranteed.
    fn collect_keys(&self, item: ItemId, visit: &mut dyn FnMut(&str)) -> Result<bool>;

    /// Removes every stored value, resetting the storage to its
    /// freshly-bound state.
    fn remove_all_values(&mut self) -> Result<()>;

    /// Removes all values for each item the source produces, until the
    /// source is exhausted.
    fn remove_item_values(&mut self, items: &mut dyn Iterator<Item = ItemId>) -> Result<()> {
        for item in items {
            let mut keys = Vec::new();
            self.collect_keys(item, &mut |k| keys.push(k.to_owned()))?;
            for key in keys {
                self.set_value(item, &key, None)?;
            }
        }
        Ok(())
    }
}

/// Lifecycle extension for storages owned by a layer.
pub trait ManagedAnnotationStorage: AnnotationStorage {
    /// Binds the storage to `layer`, allocating its backing buffers.
    ///
    /// Called exactly once per binding; binding an already-bound storage is
    /// [`LemmaError::IllegalState`].
    fn bind(&mut self, layer: &AnnotationLayer) -> Result<()>;

    /// Unbinds the storage from `layer`, releasing its backing buffers.
    ///
    /// Must match the preceding [`bind`](Self::bind); unbinding an unbound
    /// storage or naming a different layer is [`LemmaError::IllegalState`].
    fn unbind(&mut self, layer: &AnnotationLayer) -> Result<()>;

    /// Returns whether the storage is currently bound to a layer.
    fn is_bound(&self) -> bool;

    /// Returns whether `item` has a reserved slot.
    fn contains_item(&self, item: ItemId) -> bool {
        let _ = item;
        false
    }

    /// Reserves a slot for `item` without seeding any meaningful value.
    ///
    /// Returns whether the item was newly added.
    fn add_item(&mut self, item: ItemId) -> Result<bool> {
        let _ = item;
        Ok(false)
    }

    /// Releases the slot for `item` and discards all its annotations.
    ///
    /// Returns whether the item was present. Removing an absent item is a
    /// side-effect-free no-op.
    fn remove_item(&mut self, item: ItemId) -> Result<bool> {
        let _ = item;
        Ok(false)
    }

    /// Drops entries for items the caller reports dead.
    ///
    /// Only a storage constructed with
    /// [`weak_items`](StorageOptions::weak_items) performs any work; a
    /// strong storage keeps every entry until removed explicitly. Returns
    /// the number of entries dropped.
    fn sweep(&mut self, live: &mut dyn FnMut(ItemId) -> bool) -> usize {
        let _ = live;
        0
    }
}

/// Binding state and configuration shared by every storage kind.
pub(crate) struct StorageCore {
    options: StorageOptions,
    metrics: Arc<dyn StorageMetrics>,
    binding: Option<Binding>,
}

struct Binding {
    layer: LayerId,
}

impl StorageCore {
    pub(crate) fn new(options: StorageOptions) -> Self {
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        Self {
            options,
            metrics,
            binding: None,
        }
    }

    pub(crate) fn weak_items(&self) -> bool {
        self.options.weak_items
    }

    pub(crate) fn metrics(&self) -> &dyn StorageMetrics {
        &*self.metrics
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Records the binding and returns the capacity for the backing map.
    pub(crate) fn bind(&mut self, layer: &AnnotationLayer) -> Result<usize> {
        if self.binding.is_some() {
            return Err(LemmaError::IllegalState("storage is already bound to a layer"));
        }
        let capacity = self
            .options
            .initial_capacity
            .or_else(|| layer.estimate())
            .unwrap_or(DEFAULT_CAPACITY_ESTIMATE);
        debug!(
            layer = %layer.name(),
            capacity,
            weak_items = self.options.weak_items,
            "anno.bind"
        );
        self.binding = Some(Binding { layer: layer.id() });
        Ok(capacity)
    }

    pub(crate) fn unbind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        match &self.binding {
            None => Err(LemmaError::IllegalState("storage is not bound to a layer")),
            Some(binding) if binding.layer != layer.id() => Err(LemmaError::IllegalState(
                "storage is bound to a different layer",
            )),
            Some(_) => {
                debug!(layer = %layer.name(), "anno.unbind");
                self.binding = None;
                Ok(())
            }
        }
    }

    pub(crate) fn expect_bound(&self) -> Result<()> {
        if self.binding.is_none() {
            return Err(LemmaError::IllegalState("storage is not bound to a layer"));
        }
        Ok(())
    }
}
