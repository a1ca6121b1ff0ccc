use std::fmt;

/// Identity handle for one corpus item.
///
/// Items are slots in an arena owned by the corpus driver; the storage engine
/// never inspects item content and only ever compares handles for equality.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ItemId(pub u64);

/// Identity handle for one annotation layer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LayerId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        ItemId(value)
    }
}

impl From<ItemId> for u64 {
    fn from(value: ItemId) -> Self {
        value.0
    }
}

impl From<u32> for LayerId {
    fn from(value: u32) -> Self {
        LayerId(value)
    }
}

impl From<LayerId> for u32 {
    fn from(value: LayerId) -> Self {
        value.0
    }
}
