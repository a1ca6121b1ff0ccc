#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use lemma::storage::CounterMetrics;
use lemma::{
    AnnoValue, AnnotationKeyDef, AnnotationLayer, AnnotationStorage, GrowingBundle, ItemId,
    LayerId, LayerManifest, LemmaError, ManagedAnnotationStorage, MultiKeyStorage, NoEntryValue,
    SingleKeyLongStorage, StorageOptions, ValueKind,
};

fn freq_layer(id: u32) -> AnnotationLayer {
    let manifest = LayerManifest::new(
        "frequency",
        vec![AnnotationKeyDef::new("freq", ValueKind::Long).no_entry(NoEntryValue::Long(-1))],
    )
    .expect("manifest");
    AnnotationLayer::new(LayerId(id), Arc::new(manifest))
}

#[test]
fn double_bind_is_rejected() {
    let layer = freq_layer(1);
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("first bind");
    assert!(matches!(
        storage.bind(&layer),
        Err(LemmaError::IllegalState(_))
    ));
}

#[test]
fn unbind_must_match_the_bound_layer() {
    let bound = freq_layer(1);
    let other = freq_layer(2);
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());

    assert!(matches!(
        storage.unbind(&bound),
        Err(LemmaError::IllegalState(_))
    ));

    storage.bind(&bound).expect("bind");
    assert!(matches!(
        storage.unbind(&other),
        Err(LemmaError::IllegalState(_))
    ));
    storage.unbind(&bound).expect("matching unbind");
    assert!(!storage.is_bound());
}

#[test]
fn rebind_after_unbind_starts_fresh() {
    let layer = freq_layer(1);
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    storage
        .set_long_value(ItemId(1), "freq", 5)
        .expect("write");
    storage.unbind(&layer).expect("unbind");

    let layer = freq_layer(1);
    storage.bind(&layer).expect("rebind");
    assert!(!storage.has_annotations());
    assert_eq!(storage.long_value(ItemId(1), "freq").expect("read"), -1);
}

#[test]
fn unbound_storage_fails_all_value_access() {
    let mut storage = MultiKeyStorage::<GrowingBundle>::growing(StorageOptions::new());
    let item = ItemId(1);

    assert!(matches!(
        storage.value(item, "k"),
        Err(LemmaError::IllegalState(_))
    ));
    assert!(matches!(
        storage.set_value(item, "k", Some(AnnoValue::Int(1))),
        Err(LemmaError::IllegalState(_))
    ));
    assert!(matches!(
        storage.add_item(item),
        Err(LemmaError::IllegalState(_))
    ));
    assert!(matches!(
        storage.remove_all_values(),
        Err(LemmaError::IllegalState(_))
    ));
    // Presence checks stay answerable: an unbound storage is simply empty.
    assert!(!storage.has_annotations());
    assert!(!storage.contains_item(item));
}

#[test]
fn unbind_releases_buffers() {
    let layer = freq_layer(1);
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    storage.set_long_value(ItemId(1), "freq", 5).expect("write");
    storage.unbind(&layer).expect("unbind");

    assert!(matches!(
        storage.long_value(ItemId(1), "freq"),
        Err(LemmaError::IllegalState(_))
    ));
    assert!(!storage.has_annotations());
}

#[test]
fn capacity_hint_prefers_options_over_layer_estimate() {
    // Both binds succeed; the hint only sizes the backing map, so this test
    // exercises the paths rather than observable capacity.
    let layer = freq_layer(1).estimated_item_count(10_000);
    let mut storage =
        SingleKeyLongStorage::new("freq", StorageOptions::new().initial_capacity(16));
    storage.bind(&layer).expect("bind with explicit capacity");
    storage.unbind(&layer).expect("unbind");

    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind with layer estimate");
}

#[test]
fn weak_storage_sweeps_dead_items() {
    let layer = freq_layer(1);
    let mut storage = MultiKeyStorage::<GrowingBundle>::growing(
        StorageOptions::new().weak_items(true),
    );
    storage.bind(&layer).expect("bind");
    for id in 0..10 {
        storage
            .set_value(ItemId(id), "k", Some(AnnoValue::Long(id as i64)))
            .expect("write");
    }

    let swept = storage.sweep(&mut |item| item.0 < 5);
    assert_eq!(swept, 5);
    assert!(storage.item_has_annotations(ItemId(4)));
    assert!(!storage.item_has_annotations(ItemId(5)));
}

#[test]
fn counter_metrics_observe_storage_traffic() {
    let metrics = Arc::new(CounterMetrics::default());
    let layer = freq_layer(1);
    let mut storage = SingleKeyLongStorage::new(
        "freq",
        StorageOptions::new().metrics(metrics.clone()),
    );
    storage.bind(&layer).expect("bind");

    storage.add_item(ItemId(1)).expect("add");
    storage.set_long_value(ItemId(1), "freq", 2).expect("write");
    let _ = storage.long_value(ItemId(1), "freq").expect("read");
    // Writing the no-entry value erases the mapping, so remove a second,
    // still-present item to observe the removal counter.
    storage.set_long_value(ItemId(1), "freq", -1).expect("clear");
    storage.add_item(ItemId(2)).expect("add");
    storage.remove_item(ItemId(2)).expect("remove");

    assert_eq!(metrics.items_added.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.values_written.load(Ordering::Relaxed), 1);
    assert!(metrics.values_read.load(Ordering::Relaxed) >= 1);
    assert_eq!(metrics.values_cleared.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.items_removed.load(Ordering::Relaxed), 1);
}
