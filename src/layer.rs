use std::sync::Arc;

use crate::manifest::LayerManifest;
use crate::types::LayerId;

/// One annotation layer of a corpus: the target a storage binds to.
///
/// The layer itself holds no annotation data; it supplies the manifest the
/// storage reads its no-entry defaults from and an optional sizing hint the
/// driver derives from the corpus it loaded.
#[derive(Clone)]
pub struct AnnotationLayer {
    id: LayerId,
    manifest: Arc<LayerManifest>,
    estimated_item_count: Option<usize>,
}

impl AnnotationLayer {
    /// Creates a layer over the given manifest.
    pub fn new(id: LayerId, manifest: Arc<LayerManifest>) -> Self {
        Self {
            id,
            manifest,
            estimated_item_count: None,
        }
    }

    /// Sets the expected number of items this layer will carry.
    ///
    /// Storages consult this when no explicit initial capacity was
    /// configured.
    pub fn estimated_item_count(mut self, count: usize) -> Self {
        self.estimated_item_count = Some(count);
        self
    }

    /// Returns the layer id.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Returns the layer name as declared by the manifest.
    pub fn name(&self) -> &str {
        self.manifest.name()
    }

    /// Returns the manifest this layer was built from.
    pub fn manifest(&self) -> &Arc<LayerManifest> {
        &self.manifest
    }

    /// Returns the sizing hint, if the driver supplied one.
    pub fn estimate(&self) -> Option<usize> {
        self.estimated_item_count
    }
}
