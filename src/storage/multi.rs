//! Multi-key ("complex") storage: many annotation keys per item.
//!
//! Keeps one map from item to a per-item [`Bundle`] and delegates key/value
//! storage to the bundle. The bundle representation is chosen at
//! construction time through the generic parameter; every item gets a fresh
//! bundle instance created from the shared [`BundleConfig`].
//!
//! Primitive slots are updated in place through a `match` on the slot's
//! variant; rewriting a slot with an incompatible primitive kind fails with
//! [`LemmaError::TypeMismatch`] rather than reinterpreting bits. A
//! non-primitive write replaces whatever the slot held, including a
//! primitive; that direction is deliberately unguarded, mirroring the
//! generic contract where `set_value` with a fresh value is a full
//! replacement.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{LemmaError, Result};
use crate::layer::AnnotationLayer;
use crate::storage::bundle::{ArrayBundle, Bundle, GrowingBundle, HashBundle};
use crate::storage::contract::{AnnotationStorage, ManagedAnnotationStorage, StorageCore};
use crate::storage::options::{BundleConfig, StorageOptions, ARRAY_BUNDLE_CAPACITY};
use crate::storage::types::{AnnoValue, ValueKind};
use crate::types::ItemId;

fn not_bound() -> LemmaError {
    LemmaError::IllegalState("storage is not bound to a layer")
}

fn kind_mismatch(key: &str, held: ValueKind, requested: ValueKind) -> LemmaError {
    LemmaError::TypeMismatch(format!(
        "slot for `{key}` holds a {held} value, cannot serve it as {requested}"
    ))
}

/// Sparse storage for layers with many annotation keys per item.
pub struct MultiKeyStorage<B: Bundle> {
    core: StorageCore,
    config: BundleConfig,
    bundles: Option<FxHashMap<ItemId, B>>,
}

impl<B: Bundle> MultiKeyStorage<B> {
    /// Creates a storage whose bundles are sized per `config`.
    pub fn new(options: StorageOptions, config: BundleConfig) -> Self {
        Self {
            core: StorageCore::new(options),
            config,
            bundles: None,
        }
    }

    /// The bundle sizing configuration.
    pub fn bundle_config(&self) -> BundleConfig {
        self.config
    }

    fn bundles(&self) -> Result<&FxHashMap<ItemId, B>> {
        self.bundles.as_ref().ok_or_else(not_bound)
    }

    fn bundles_mut(&mut self) -> Result<&mut FxHashMap<ItemId, B>> {
        self.bundles.as_mut().ok_or_else(not_bound)
    }

    fn buffer_create(&mut self, item: ItemId) -> Result<&mut B> {
        let config = self.config;
        let bundles = self.bundles.as_mut().ok_or_else(not_bound)?;
        Ok(bundles.entry(item).or_insert_with(|| B::create(&config)))
    }

    fn slot(&self, item: ItemId, key: &str) -> Result<Option<&AnnoValue>> {
        let bundles = self.bundles()?;
        self.core.metrics().value_read();
        Ok(bundles.get(&item).and_then(|bundle| bundle.value(key)))
    }

    fn write_primitive(&mut self, item: ItemId, key: &str, value: AnnoValue) -> Result<()> {
        let kind = value.kind();
        debug_assert!(kind.is_primitive());
        let bundle = self.buffer_create(item)?;
        let Some(slot) = bundle.get_or_try_insert(key, value.clone()) else {
            return Err(LemmaError::IllegalState(
                "bundle capacity exhausted, cannot allocate a slot",
            ));
        };
        if slot.kind() != kind {
            return Err(kind_mismatch(key, slot.kind(), kind));
        }
        *slot = value;
        self.core.metrics().value_written();
        Ok(())
    }

    fn write_replacing(&mut self, item: ItemId, key: &str, value: AnnoValue) -> Result<bool> {
        let bundle = self.buffer_create(item)?;
        let changed = bundle.set_value(key, Some(value));
        if changed {
            self.core.metrics().value_written();
        }
        Ok(changed)
    }

    fn clear_key(&mut self, item: ItemId, key: &str) -> Result<bool> {
        let bundles = self.bundles_mut()?;
        let changed = match bundles.get_mut(&item) {
            Some(bundle) => bundle.set_value(key, None),
            None => false,
        };
        if changed {
            self.core.metrics().value_cleared();
        }
        Ok(changed)
    }
}

impl MultiKeyStorage<ArrayBundle> {
    /// Storage for layers with a small, fixed annotation set per item.
    pub fn fixed(options: StorageOptions) -> Self {
        Self::new(options, BundleConfig::with_capacity(ARRAY_BUNDLE_CAPACITY))
    }
}

impl MultiKeyStorage<GrowingBundle> {
    /// Storage whose bundles adapt from array to map form as items
    /// accumulate keys.
    pub fn growing(options: StorageOptions) -> Self {
        Self::new(options, BundleConfig::default())
    }
}

impl MultiKeyStorage<HashBundle> {
    /// Storage for layers known to carry many distinct keys per item.
    pub fn large(options: StorageOptions) -> Self {
        Self::new(options, BundleConfig::default())
    }
}

impl<B: Bundle> AnnotationStorage for MultiKeyStorage<B> {
    fn value(&self, item: ItemId, key: &str) -> Result<Option<AnnoValue>> {
        Ok(self.slot(item, key)?.cloned())
    }

    fn set_value(&mut self, item: ItemId, key: &str, value: Option<AnnoValue>) -> Result<bool> {
        let Some(value) = value else {
            return self.clear_key(item, key);
        };
        if !value.is_primitive() {
            // Deliberately unguarded: a non-primitive write replaces even a
            // primitive slot.
            return self.write_replacing(item, key, value);
        }
        let kind = value.kind();
        let bundle = self.buffer_create(item)?;
        match bundle.value(key).map(AnnoValue::kind) {
            Some(held) if held == kind => {
                if let Some(slot) = bundle.value_mut(key) {
                    *slot = value;
                }
                self.core.metrics().value_written();
                Ok(true)
            }
            Some(held) => Err(kind_mismatch(key, held, kind)),
            None => {
                let changed = bundle.set_value(key, Some(value));
                if changed {
                    self.core.metrics().value_written();
                }
                Ok(changed)
            }
        }
    }

    fn string_value(&self, item: ItemId, key: &str) -> Result<Option<Arc<str>>> {
        match self.slot(item, key)? {
            None => Ok(None),
            Some(AnnoValue::Str(s)) => Ok(Some(Arc::clone(s))),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::String)),
        }
    }

    fn integer_value(&self, item: ItemId, key: &str) -> Result<i32> {
        match self.slot(item, key)? {
            None => Ok(0),
            Some(AnnoValue::Int(v)) => Ok(*v),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::Integer)),
        }
    }

    fn long_value(&self, item: ItemId, key: &str) -> Result<i64> {
        match self.slot(item, key)? {
            None => Ok(0),
            Some(AnnoValue::Long(v)) => Ok(*v),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::Long)),
        }
    }

    fn float_value(&self, item: ItemId, key: &str) -> Result<f32> {
        match self.slot(item, key)? {
            None => Ok(0.0),
            Some(AnnoValue::Float(v)) => Ok(*v),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::Float)),
        }
    }

    fn double_value(&self, item: ItemId, key: &str) -> Result<f64> {
        match self.slot(item, key)? {
            None => Ok(0.0),
            Some(AnnoValue::Double(v)) => Ok(*v),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::Double)),
        }
    }

    fn boolean_value(&self, item: ItemId, key: &str) -> Result<bool> {
        match self.slot(item, key)? {
            None => Ok(false),
            Some(AnnoValue::Bool(v)) => Ok(*v),
            Some(other) => Err(kind_mismatch(key, other.kind(), ValueKind::Boolean)),
        }
    }

    fn set_string_value(&mut self, item: ItemId, key: &str, value: Option<Arc<str>>) -> Result<()> {
        match value {
            Some(s) => {
                self.write_replacing(item, key, AnnoValue::Str(s))?;
            }
            None => {
                self.clear_key(item, key)?;
            }
        }
        Ok(())
    }

    fn set_integer_value(&mut self, item: ItemId, key: &str, value: i32) -> Result<()> {
        self.write_primitive(item, key, AnnoValue::Int(value))
    }

    fn set_long_value(&mut self, item: ItemId, key: &str, value: i64) -> Result<()> {
        self.write_primitive(item, key, AnnoValue::Long(value))
    }

    fn set_float_value(&mut self, item: ItemId, key: &str, value: f32) -> Result<()> {
        self.write_primitive(item, key, AnnoValue::Float(value))
    }

    fn set_double_value(&mut self, item: ItemId, key: &str, value: f64) -> Result<()> {
        self.write_primitive(item, key, AnnoValue::Double(value))
    }

    fn set_boolean_value(&mut self, item: ItemId, key: &str, value: bool) -> Result<()> {
        self.write_primitive(item, key, AnnoValue::Bool(value))
    }

    fn has_annotations(&self) -> bool {
        match &self.bundles {
            Some(bundles) => bundles.values().any(|bundle| !bundle.is_empty()),
            None => false,
        }
    }

    fn item_has_annotations(&self, item: ItemId) -> bool {
        match &self.bundles {
            Some(bundles) => bundles.get(&item).is_some_and(|bundle| !bundle.is_empty()),
            None => false,
        }
    }

    fn collect_keys(&self, item: ItemId, visit: &mut dyn FnMut(&str)) -> Result<bool> {
        let bundles = self.bundles()?;
        Ok(match bundles.get(&item) {
            Some(bundle) => bundle.collect_keys(visit),
            None => false,
        })
    }

    fn remove_all_values(&mut self) -> Result<()> {
        let bundles = self.bundles_mut()?;
        let dropped = bundles.len();
        bundles.clear();
        debug!(dropped, "anno.clear");
        Ok(())
    }

    fn remove_item_values(&mut self, items: &mut dyn Iterator<Item = ItemId>) -> Result<()> {
        let bundles = self.bundles_mut()?;
        for item in items {
            bundles.remove(&item);
        }
        Ok(())
    }
}

impl<B: Bundle> ManagedAnnotationStorage for MultiKeyStorage<B> {
    fn bind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        let capacity = self.core.bind(layer)?;
        self.bundles = Some(FxHashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ));
        Ok(())
    }

    fn unbind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        self.core.unbind(layer)?;
        self.bundles = None;
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.core.is_bound()
    }

    fn contains_item(&self, item: ItemId) -> bool {
        self.bundles
            .as_ref()
            .is_some_and(|bundles| bundles.contains_key(&item))
    }

    fn add_item(&mut self, item: ItemId) -> Result<bool> {
        let config = self.config;
        let bundles = self.bundles_mut()?;
        if bundles.contains_key(&item) {
            return Ok(false);
        }
        bundles.insert(item, B::create(&config));
        self.core.metrics().item_added();
        Ok(true)
    }

    fn remove_item(&mut self, item: ItemId) -> Result<bool> {
        let removed = self.bundles_mut()?.remove(&item).is_some();
        if removed {
            self.core.metrics().item_removed();
        }
        Ok(removed)
    }

    fn sweep(&mut self, live: &mut dyn FnMut(ItemId) -> bool) -> usize {
        if !self.core.weak_items() {
            return 0;
        }
        let Some(bundles) = self.bundles.as_mut() else {
            return 0;
        };
        let before = bundles.len();
        bundles.retain(|item, _| live(*item));
        before - bundles.len()
    }
}
