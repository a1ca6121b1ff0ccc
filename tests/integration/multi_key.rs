#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::Arc;

use lemma::{
    AnnoValue, AnnotationLayer, AnnotationStorage, ArrayBundle, Bundle, BundleConfig,
    GrowingBundle, ItemId, LayerId, LayerManifest, LemmaError, ManagedAnnotationStorage,
    MultiKeyStorage, StorageOptions,
};

fn misc_layer() -> AnnotationLayer {
    let manifest = LayerManifest::new("misc", Vec::new()).expect("manifest");
    AnnotationLayer::new(LayerId(40), Arc::new(manifest))
}

fn keys_for<S: AnnotationStorage>(storage: &S, item: ItemId) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    storage
        .collect_keys(item, &mut |k| {
            keys.insert(k.to_owned());
        })
        .expect("collect");
    keys
}

#[test]
fn round_trip_across_value_kinds() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::growing(StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(1);

    let values = [
        ("int", AnnoValue::Int(-3)),
        ("long", AnnoValue::Long(1 << 40)),
        ("float", AnnoValue::Float(0.25)),
        ("double", AnnoValue::Double(-0.5)),
        ("bool", AnnoValue::Bool(true)),
        ("str", AnnoValue::str("lemma")),
    ];
    for (key, value) in &values {
        assert!(storage
            .set_value(item, key, Some(value.clone()))
            .expect("write"));
    }
    for (key, value) in &values {
        assert_eq!(storage.value(item, key).expect("read"), Some(value.clone()));
    }

    // Clearing the only keys flips the presence checks back.
    for (key, _) in &values {
        assert!(storage.set_value(item, key, None).expect("clear"));
    }
    assert!(!storage.item_has_annotations(item));
    assert!(!storage.has_annotations());
}

#[test]
fn key_enumeration_tracks_live_entries_exactly() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::growing(StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(2);

    for i in 0..6 {
        storage
            .set_value(item, &format!("k{i}"), Some(AnnoValue::Long(i)))
            .expect("write");
    }
    storage.set_value(item, "k2", None).expect("clear");
    storage.set_value(item, "k4", None).expect("clear");

    let expected: BTreeSet<String> = ["k0", "k1", "k3", "k5"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    assert_eq!(keys_for(&storage, item), expected);
}

#[test]
fn growing_bundle_promotion_scenario() {
    let config = BundleConfig::with_capacity(8).array_threshold(16);
    let mut bundle = GrowingBundle::create(&config);

    for i in 0..16 {
        assert!(bundle.set_value(&format!("k{i}"), Some(AnnoValue::Long(i as i64))));
    }
    assert!(!bundle.is_map_backed(), "16 keys stay in array form");

    assert!(bundle.set_value("k16", Some(AnnoValue::Long(16))));
    assert!(bundle.is_map_backed(), "17th key promotes to map form");

    for i in 0..17 {
        assert_eq!(
            bundle.value(&format!("k{i}")),
            Some(&AnnoValue::Long(i as i64))
        );
    }
}

#[test]
fn array_bundle_capacity_boundary() {
    let mut bundle = ArrayBundle::new();
    for i in 0..bundle.capacity() {
        assert!(bundle.set_value(&format!("k{i}"), Some(AnnoValue::Int(i as i32))));
    }
    assert!(!bundle.set_value("overflow", Some(AnnoValue::Int(-1))));
    assert_eq!(bundle.len(), bundle.capacity());
    for i in 0..bundle.capacity() {
        assert_eq!(
            bundle.value(&format!("k{i}")),
            Some(&AnnoValue::Int(i as i32))
        );
    }
}

#[test]
fn primitive_type_stability_is_enforced() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::growing(StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(3);

    storage
        .set_value(item, "n", Some(AnnoValue::Int(1)))
        .expect("first write");
    let err = storage
        .set_value(item, "n", Some(AnnoValue::Long(2)))
        .expect_err("kind change must fail");
    assert!(matches!(err, LemmaError::TypeMismatch(_)));
    assert_eq!(storage.integer_value(item, "n").expect("read"), 1);
}

#[test]
fn large_storage_handles_many_keys_per_item() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::large(StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(4);

    for i in 0..200 {
        storage
            .set_value(item, &format!("feature-{i}"), Some(AnnoValue::Bool(i % 2 == 0)))
            .expect("write");
    }
    assert_eq!(keys_for(&storage, item).len(), 200);
    assert!(storage.boolean_value(item, "feature-0").expect("read"));
    assert!(!storage.boolean_value(item, "feature-1").expect("read"));
}

#[test]
fn remove_item_discards_all_annotations_of_that_item() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::growing(StorageOptions::new());
    storage.bind(&layer).expect("bind");

    storage
        .set_value(ItemId(1), "a", Some(AnnoValue::Int(1)))
        .expect("write");
    storage
        .set_value(ItemId(2), "a", Some(AnnoValue::Int(2)))
        .expect("write");

    assert!(storage.remove_item(ItemId(1)).expect("remove"));
    assert!(!storage.item_has_annotations(ItemId(1)));
    assert_eq!(storage.integer_value(ItemId(2), "a").expect("read"), 2);
}

#[test]
fn remove_item_values_accepts_any_item_source() {
    let layer = misc_layer();
    let mut storage = MultiKeyStorage::growing(StorageOptions::new());
    storage.bind(&layer).expect("bind");
    for id in 0..6 {
        storage
            .set_value(ItemId(id), "k", Some(AnnoValue::Long(id as i64)))
            .expect("write");
    }

    let mut evens = (0..6).filter(|id| id % 2 == 0).map(ItemId);
    storage.remove_item_values(&mut evens).expect("bulk remove");

    for id in 0..6 {
        assert_eq!(storage.item_has_annotations(ItemId(id)), id % 2 == 1);
    }
}
