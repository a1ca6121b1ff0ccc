//! Single-key storages: one annotation key per layer, one value per item.
//!
//! These are the dense end of the storage spectrum. With exactly one legal
//! key there is nothing to dispatch on: the key argument only needs
//! validation, and the backing structure is one flat map from item to value.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{LemmaError, Result};
use crate::layer::AnnotationLayer;
use crate::manifest::NO_ENTRY_LONG;
use crate::storage::contract::{AnnotationStorage, ManagedAnnotationStorage, StorageCore};
use crate::storage::options::StorageOptions;
use crate::storage::types::{AnnoValue, ValueKind};
use crate::types::ItemId;

fn not_bound() -> LemmaError {
    LemmaError::IllegalState("storage is not bound to a layer")
}

/// Single-key storage for 64-bit integer values.
///
/// Values live in a primitive map from item to long. The key's no-entry
/// default comes from the layer manifest at bind time, falling back to
/// [`NO_ENTRY_LONG`]; writing the no-entry value removes the mapping, so the
/// map's size always equals the number of items with a meaningful value plus
/// any slots reserved through [`add_item`](ManagedAnnotationStorage::add_item).
pub struct SingleKeyLongStorage {
    core: StorageCore,
    key: Arc<str>,
    no_entry: i64,
    values: Option<FxHashMap<ItemId, i64>>,
}

impl SingleKeyLongStorage {
    /// Creates a storage for the given fixed key.
    pub fn new(key: impl AsRef<str>, options: StorageOptions) -> Self {
        Self {
            core: StorageCore::new(options),
            key: Arc::from(key.as_ref()),
            no_entry: NO_ENTRY_LONG,
            values: None,
        }
    }

    /// The one key this storage serves.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The resolved no-entry default.
    pub fn no_entry_value(&self) -> i64 {
        self.no_entry
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if key != &*self.key {
            return Err(LemmaError::InvalidKey(format!(
                "storage serves key `{}`, got `{key}`",
                self.key
            )));
        }
        Ok(())
    }

    fn values(&self) -> Result<&FxHashMap<ItemId, i64>> {
        self.values.as_ref().ok_or_else(not_bound)
    }

    fn values_mut(&mut self) -> Result<&mut FxHashMap<ItemId, i64>> {
        self.values.as_mut().ok_or_else(not_bound)
    }
}

impl AnnotationStorage for SingleKeyLongStorage {
    fn value(&self, item: ItemId, key: &str) -> Result<Option<AnnoValue>> {
        Ok(Some(AnnoValue::Long(self.long_value(item, key)?)))
    }

    fn set_value(&mut self, item: ItemId, key: &str, value: Option<AnnoValue>) -> Result<bool> {
        self.check_key(key)?;
        let value = match value {
            None => self.no_entry,
            Some(AnnoValue::Long(v)) => v,
            Some(AnnoValue::Int(v)) => i64::from(v),
            Some(other) => {
                return Err(LemmaError::TypeMismatch(format!(
                    "cannot store a {} value under long key `{key}`",
                    other.kind()
                )))
            }
        };
        let no_entry = self.no_entry;
        let values = self.values_mut()?;
        let changed = if value == no_entry {
            values.remove(&item).is_some()
        } else {
            values.insert(item, value) != Some(value)
        };
        if changed {
            if value == no_entry {
                self.core.metrics().value_cleared();
            } else {
                self.core.metrics().value_written();
            }
        }
        Ok(changed)
    }

    fn integer_value(&self, item: ItemId, key: &str) -> Result<i32> {
        let value = self.long_value(item, key)?;
        i32::try_from(value).map_err(|_| {
            LemmaError::TypeMismatch(format!(
                "stored long {value} under `{key}` exceeds the integer range"
            ))
        })
    }

    fn long_value(&self, item: ItemId, key: &str) -> Result<i64> {
        self.check_key(key)?;
        let values = self.values()?;
        self.core.metrics().value_read();
        Ok(values.get(&item).copied().unwrap_or(self.no_entry))
    }

    fn float_value(&self, item: ItemId, key: &str) -> Result<f32> {
        Ok(self.long_value(item, key)? as f32)
    }

    fn double_value(&self, item: ItemId, key: &str) -> Result<f64> {
        Ok(self.long_value(item, key)? as f64)
    }

    fn set_integer_value(&mut self, item: ItemId, key: &str, value: i32) -> Result<()> {
        self.set_long_value(item, key, i64::from(value))
    }

    fn set_long_value(&mut self, item: ItemId, key: &str, value: i64) -> Result<()> {
        self.set_value(item, key, Some(AnnoValue::Long(value)))?;
        Ok(())
    }

    fn has_annotations(&self) -> bool {
        match &self.values {
            Some(values) => values.values().any(|v| *v != self.no_entry),
            None => false,
        }
    }

    fn item_has_annotations(&self, item: ItemId) -> bool {
        match &self.values {
            Some(values) => values.get(&item).is_some_and(|v| *v != self.no_entry),
            None => false,
        }
    }

    fn collect_keys(&self, item: ItemId, visit: &mut dyn FnMut(&str)) -> Result<bool> {
        self.values()?;
        if self.item_has_annotations(item) {
            visit(&self.key);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remove_all_values(&mut self) -> Result<()> {
        let values = self.values_mut()?;
        let dropped = values.len();
        values.clear();
        debug!(dropped, "anno.clear");
        Ok(())
    }

    fn remove_item_values(&mut self, items: &mut dyn Iterator<Item = ItemId>) -> Result<()> {
        let values = self.values_mut()?;
        for item in items {
            values.remove(&item);
        }
        Ok(())
    }
}

impl ManagedAnnotationStorage for SingleKeyLongStorage {
    fn bind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        let manifest = layer.manifest();
        let def = manifest.key(&self.key).ok_or_else(|| {
            LemmaError::InvalidKey(format!(
                "layer `{}` does not declare key `{}`",
                layer.name(),
                self.key
            ))
        })?;
        if !ValueKind::Long.accepts(def.kind) {
            return Err(LemmaError::TypeMismatch(format!(
                "key `{}` is declared as {}, long storage requires an integer or long key",
                self.key, def.kind
            )));
        }
        let capacity = self.core.bind(layer)?;
        self.no_entry = manifest.no_entry_long(&self.key).unwrap_or(NO_ENTRY_LONG);
        self.values = Some(FxHashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ));
        Ok(())
    }

    fn unbind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        self.core.unbind(layer)?;
        self.values = None;
        self.no_entry = NO_ENTRY_LONG;
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.core.is_bound()
    }

    fn contains_item(&self, item: ItemId) -> bool {
        self.values
            .as_ref()
            .is_some_and(|values| values.contains_key(&item))
    }

    fn add_item(&mut self, item: ItemId) -> Result<bool> {
        let no_entry = self.no_entry;
        let values = self.values_mut()?;
        if values.contains_key(&item) {
            return Ok(false);
        }
        values.insert(item, no_entry);
        self.core.metrics().item_added();
        Ok(true)
    }

    fn remove_item(&mut self, item: ItemId) -> Result<bool> {
        let removed = self.values_mut()?.remove(&item).is_some();
        if removed {
            self.core.metrics().item_removed();
        }
        Ok(removed)
    }

    fn sweep(&mut self, live: &mut dyn FnMut(ItemId) -> bool) -> usize {
        if !self.core.weak_items() {
            return 0;
        }
        let Some(values) = self.values.as_mut() else {
            return 0;
        };
        let before = values.len();
        values.retain(|item, _| live(*item));
        before - values.len()
    }
}

/// Value slot of [`SingleKeyStringStorage`].
///
/// `Reserved` marks an item that was added but never assigned a value; it
/// reads back as the no-entry default, exactly like a removed entry, but
/// keeps the slot discoverable through `contains_item`.
#[derive(Clone, Debug, PartialEq)]
enum StringSlot {
    Reserved,
    Value(Arc<str>),
}

/// Single-key storage for string values.
pub struct SingleKeyStringStorage {
    core: StorageCore,
    key: Arc<str>,
    no_entry: Option<Arc<str>>,
    values: Option<FxHashMap<ItemId, StringSlot>>,
}

impl SingleKeyStringStorage {
    /// Creates a storage for the given fixed key.
    pub fn new(key: impl AsRef<str>, options: StorageOptions) -> Self {
        Self {
            core: StorageCore::new(options),
            key: Arc::from(key.as_ref()),
            no_entry: None,
            values: None,
        }
    }

    /// The one key this storage serves.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The resolved no-entry default, if the manifest declares one.
    pub fn no_entry_value(&self) -> Option<&str> {
        self.no_entry.as_deref()
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if key != &*self.key {
            return Err(LemmaError::InvalidKey(format!(
                "storage serves key `{}`, got `{key}`",
                self.key
            )));
        }
        Ok(())
    }

    fn values(&self) -> Result<&FxHashMap<ItemId, StringSlot>> {
        self.values.as_ref().ok_or_else(not_bound)
    }

    fn values_mut(&mut self) -> Result<&mut FxHashMap<ItemId, StringSlot>> {
        self.values.as_mut().ok_or_else(not_bound)
    }

    fn write(&mut self, item: ItemId, value: Option<Arc<str>>) -> Result<bool> {
        // A write equal to the no-entry default is a removal.
        let value = match value {
            Some(v) if self.no_entry.as_deref() != Some(&*v) => Some(v),
            _ => None,
        };
        let values = self.values_mut()?;
        let changed = match value {
            Some(v) => {
                let changed =
                    values.insert(item, StringSlot::Value(v.clone())) != Some(StringSlot::Value(v));
                if changed {
                    self.core.metrics().value_written();
                }
                changed
            }
            None => {
                let changed = values.remove(&item).is_some();
                if changed {
                    self.core.metrics().value_cleared();
                }
                changed
            }
        };
        Ok(changed)
    }
}

impl AnnotationStorage for SingleKeyStringStorage {
    fn value(&self, item: ItemId, key: &str) -> Result<Option<AnnoValue>> {
        Ok(self.string_value(item, key)?.map(AnnoValue::Str))
    }

    fn set_value(&mut self, item: ItemId, key: &str, value: Option<AnnoValue>) -> Result<bool> {
        self.check_key(key)?;
        match value {
            None => self.write(item, None),
            Some(AnnoValue::Str(s)) => self.write(item, Some(s)),
            Some(other) => Err(LemmaError::TypeMismatch(format!(
                "cannot store a {} value under string key `{key}`",
                other.kind()
            ))),
        }
    }

    fn string_value(&self, item: ItemId, key: &str) -> Result<Option<Arc<str>>> {
        self.check_key(key)?;
        let values = self.values()?;
        self.core.metrics().value_read();
        Ok(match values.get(&item) {
            Some(StringSlot::Value(s)) => Some(Arc::clone(s)),
            Some(StringSlot::Reserved) | None => self.no_entry.clone(),
        })
    }

    fn set_string_value(&mut self, item: ItemId, key: &str, value: Option<Arc<str>>) -> Result<()> {
        self.check_key(key)?;
        self.write(item, value)?;
        Ok(())
    }

    fn has_annotations(&self) -> bool {
        match &self.values {
            Some(values) => values.values().any(|v| matches!(v, StringSlot::Value(_))),
            None => false,
        }
    }

    fn item_has_annotations(&self, item: ItemId) -> bool {
        match &self.values {
            Some(values) => matches!(values.get(&item), Some(StringSlot::Value(_))),
            None => false,
        }
    }

    fn collect_keys(&self, item: ItemId, visit: &mut dyn FnMut(&str)) -> Result<bool> {
        self.values()?;
        if self.item_has_annotations(item) {
            visit(&self.key);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remove_all_values(&mut self) -> Result<()> {
        let values = self.values_mut()?;
        let dropped = values.len();
        values.clear();
        debug!(dropped, "anno.clear");
        Ok(())
    }

    fn remove_item_values(&mut self, items: &mut dyn Iterator<Item = ItemId>) -> Result<()> {
        let values = self.values_mut()?;
        for item in items {
            values.remove(&item);
        }
        Ok(())
    }
}

impl ManagedAnnotationStorage for SingleKeyStringStorage {
    fn bind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        let manifest = layer.manifest();
        let def = manifest.key(&self.key).ok_or_else(|| {
            LemmaError::InvalidKey(format!(
                "layer `{}` does not declare key `{}`",
                layer.name(),
                self.key
            ))
        })?;
        if def.kind != ValueKind::String {
            return Err(LemmaError::TypeMismatch(format!(
                "key `{}` is declared as {}, string storage requires a string key",
                self.key, def.kind
            )));
        }
        let capacity = self.core.bind(layer)?;
        self.no_entry = manifest.no_entry_str(&self.key);
        self.values = Some(FxHashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ));
        Ok(())
    }

    fn unbind(&mut self, layer: &AnnotationLayer) -> Result<()> {
        self.core.unbind(layer)?;
        self.values = None;
        self.no_entry = None;
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.core.is_bound()
    }

    fn contains_item(&self, item: ItemId) -> bool {
        self.values
            .as_ref()
            .is_some_and(|values| values.contains_key(&item))
    }

    fn add_item(&mut self, item: ItemId) -> Result<bool> {
        let values = self.values_mut()?;
        if values.contains_key(&item) {
            return Ok(false);
        }
        values.insert(item, StringSlot::Reserved);
        self.core.metrics().item_added();
        Ok(true)
    }

    fn remove_item(&mut self, item: ItemId) -> Result<bool> {
        let removed = self.values_mut()?.remove(&item).is_some();
        if removed {
            self.core.metrics().item_removed();
        }
        Ok(removed)
    }

    fn sweep(&mut self, live: &mut dyn FnMut(ItemId) -> bool) -> usize {
        if !self.core.weak_items() {
            return 0;
        }
        let Some(values) = self.values.as_mut() else {
            return 0;
        };
        let before = values.len();
        values.retain(|item, _| live(*item));
        before - values.len()
    }
}
