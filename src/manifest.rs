//! Layer manifests: the externally declared schema of an annotation layer.
//!
//! A manifest lists the annotation keys a layer may carry, the value kind of
//! each key, and an optional per-key no-entry default. Storages read this
//! information once at bind time; the manifest itself stays immutable and is
//! shared behind an [`Arc`](std::sync::Arc) by every consumer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LemmaError, Result};
use crate::storage::{AnnoValue, ValueKind};

/// Sentinel used by long-valued storages when a key declares no default.
pub const NO_ENTRY_LONG: i64 = -1;

/// Declared no-entry default for one annotation key.
///
/// This is the serializable subset of [`AnnoValue`]: object-valued keys
/// cannot declare a default, absence is their only no-entry state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoEntryValue {
    /// 32-bit integer default.
    Int(i32),
    /// 64-bit integer default.
    Long(i64),
    /// 32-bit float default.
    Float(f32),
    /// 64-bit float default.
    Double(f64),
    /// Boolean default.
    Bool(bool),
    /// String default.
    Str(String),
}

impl NoEntryValue {
    /// Returns the value kind this default belongs to.
    pub fn kind(&self) -> ValueKind {
        match self {
            NoEntryValue::Int(_) => ValueKind::Integer,
            NoEntryValue::Long(_) => ValueKind::Long,
            NoEntryValue::Float(_) => ValueKind::Float,
            NoEntryValue::Double(_) => ValueKind::Double,
            NoEntryValue::Bool(_) => ValueKind::Boolean,
            NoEntryValue::Str(_) => ValueKind::String,
        }
    }

    /// Converts the declared default into an engine value.
    pub fn to_value(&self) -> AnnoValue {
        match self {
            NoEntryValue::Int(v) => AnnoValue::Int(*v),
            NoEntryValue::Long(v) => AnnoValue::Long(*v),
            NoEntryValue::Float(v) => AnnoValue::Float(*v),
            NoEntryValue::Double(v) => AnnoValue::Double(*v),
            NoEntryValue::Bool(v) => AnnoValue::Bool(*v),
            NoEntryValue::Str(v) => AnnoValue::Str(Arc::from(v.as_str())),
        }
    }
}

/// Declaration of one annotation key within a layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationKeyDef {
    /// The key naming this annotation slot.
    pub key: String,
    /// The value kind stored under the key.
    pub kind: ValueKind,
    /// Optional no-entry default returned when a key has no stored value.
    #[serde(default)]
    pub no_entry: Option<NoEntryValue>,
}

impl AnnotationKeyDef {
    /// Creates a key declaration without a no-entry default.
    pub fn new(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            no_entry: None,
        }
    }

    /// Sets the no-entry default for this key.
    pub fn no_entry(mut self, value: NoEntryValue) -> Self {
        self.no_entry = Some(value);
        self
    }
}

/// Immutable schema of one annotation layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerManifest {
    name: String,
    keys: Vec<AnnotationKeyDef>,
}

impl LayerManifest {
    /// Creates a manifest from a list of key declarations.
    ///
    /// Fails with [`LemmaError::Manifest`] when two declarations name the
    /// same key or a declared default does not match the declared kind.
    pub fn new(name: impl Into<String>, keys: Vec<AnnotationKeyDef>) -> Result<Self> {
        let manifest = Self {
            name: name.into(),
            keys,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: LayerManifest =
            serde_json::from_str(json).map_err(|e| LemmaError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let mut sorted: Vec<&str> = self.keys.iter().map(|k| k.key.as_str()).collect();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(LemmaError::Manifest(format!(
                    "duplicate annotation key `{}` in layer `{}`",
                    pair[0], self.name
                )));
            }
        }
        for def in &self.keys {
            if let Some(no_entry) = &def.no_entry {
                if !def.kind.accepts(no_entry.kind()) {
                    return Err(LemmaError::Manifest(format!(
                        "no-entry default for key `{}` has kind {:?}, declared kind is {:?}",
                        def.key,
                        no_entry.kind(),
                        def.kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all declared keys.
    pub fn keys(&self) -> &[AnnotationKeyDef] {
        &self.keys
    }

    /// Looks up the declaration for `key`.
    pub fn key(&self, key: &str) -> Option<&AnnotationKeyDef> {
        self.keys.iter().find(|k| k.key == key)
    }

    /// Returns whether the manifest declares `key`.
    pub fn declares_key(&self, key: &str) -> bool {
        self.key(key).is_some()
    }

    /// Returns the declared no-entry default for `key` as an engine value.
    pub fn no_entry(&self, key: &str) -> Option<AnnoValue> {
        self.key(key)
            .and_then(|k| k.no_entry.as_ref())
            .map(NoEntryValue::to_value)
    }

    /// Returns the declared no-entry default for `key` widened to a long.
    pub fn no_entry_long(&self, key: &str) -> Option<i64> {
        match self.key(key).and_then(|k| k.no_entry.as_ref()) {
            Some(NoEntryValue::Int(v)) => Some(i64::from(*v)),
            Some(NoEntryValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the declared no-entry default for `key` as a string.
    pub fn no_entry_str(&self, key: &str) -> Option<Arc<str>> {
        match self.key(key).and_then(|k| k.no_entry.as_ref()) {
            Some(NoEntryValue::Str(v)) => Some(Arc::from(v.as_str())),
            _ => None,
        }
    }
}
