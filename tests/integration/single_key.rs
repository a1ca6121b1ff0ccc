#![allow(missing_docs)]

use std::sync::Arc;

use lemma::{
    AnnotationKeyDef, AnnotationLayer, AnnotationStorage, ItemId, LayerId, LayerManifest,
    LemmaError, ManagedAnnotationStorage, NoEntryValue, SingleKeyLongStorage,
    SingleKeyStringStorage, StorageOptions, ValueKind, NO_ENTRY_LONG,
};

fn freq_layer() -> AnnotationLayer {
    let manifest = LayerManifest::new(
        "frequency",
        vec![AnnotationKeyDef::new("freq", ValueKind::Long).no_entry(NoEntryValue::Long(-1))],
    )
    .expect("manifest");
    AnnotationLayer::new(LayerId(1), Arc::new(manifest))
}

fn tag_layer() -> AnnotationLayer {
    let manifest = LayerManifest::new(
        "pos",
        vec![AnnotationKeyDef::new("tag", ValueKind::String).no_entry(NoEntryValue::Str("_".into()))],
    )
    .expect("manifest");
    AnnotationLayer::new(LayerId(2), Arc::new(manifest))
}

#[test]
fn long_storage_no_entry_scenario() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let x = ItemId(100);

    assert!(storage.add_item(x).expect("add"));
    assert_eq!(storage.long_value(x, "freq").expect("read"), -1);

    storage.set_long_value(x, "freq", 42).expect("write");
    assert_eq!(storage.long_value(x, "freq").expect("read"), 42);
    assert!(storage.has_annotations());

    storage.set_long_value(x, "freq", -1).expect("clear");
    assert!(!storage.item_has_annotations(x));
    assert!(!storage.has_annotations());
}

#[test]
fn long_storage_falls_back_to_global_sentinel() {
    let manifest = LayerManifest::new(
        "frequency",
        vec![AnnotationKeyDef::new("freq", ValueKind::Long)],
    )
    .expect("manifest");
    let layer = AnnotationLayer::new(LayerId(3), Arc::new(manifest));
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    assert_eq!(storage.no_entry_value(), NO_ENTRY_LONG);
    assert_eq!(
        storage.long_value(ItemId(1), "freq").expect("read"),
        NO_ENTRY_LONG
    );
}

#[test]
fn key_isolation_holds_for_unknown_items_too() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let never_added = ItemId(777);

    for result in [
        storage.long_value(never_added, "other").map(|_| ()),
        storage.integer_value(never_added, "other").map(|_| ()),
        storage.value(never_added, "other").map(|_| ()),
        storage.set_long_value(never_added, "other", 1),
    ] {
        assert!(matches!(result, Err(LemmaError::InvalidKey(_))));
    }
}

#[test]
fn removal_is_idempotent() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(5);

    assert!(!storage.remove_item(item).expect("remove absent"));
    storage.add_item(item).expect("add");
    assert!(storage.remove_item(item).expect("remove present"));
    assert!(!storage.remove_item(item).expect("remove again"));
}

#[test]
fn collect_keys_reports_the_single_key() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(8);

    let mut visited = Vec::new();
    assert!(!storage
        .collect_keys(item, &mut |k| visited.push(k.to_owned()))
        .expect("collect"));
    assert!(visited.is_empty());

    storage.set_long_value(item, "freq", 9).expect("write");
    assert!(storage
        .collect_keys(item, &mut |k| visited.push(k.to_owned()))
        .expect("collect"));
    assert_eq!(visited, vec!["freq"]);
}

#[test]
fn string_storage_no_entry_round_trip() {
    let layer = tag_layer();
    let mut storage = SingleKeyStringStorage::new("tag", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    let item = ItemId(11);

    assert_eq!(
        storage.string_value(item, "tag").expect("read").as_deref(),
        Some("_")
    );

    storage
        .set_string_value(item, "tag", Some(Arc::from("NN")))
        .expect("write");
    assert_eq!(
        storage.string_value(item, "tag").expect("read").as_deref(),
        Some("NN")
    );
    assert!(storage.item_has_annotations(item));

    storage
        .set_string_value(item, "tag", Some(Arc::from("_")))
        .expect("write no-entry");
    assert_eq!(
        storage.string_value(item, "tag").expect("read").as_deref(),
        Some("_")
    );
    assert!(!storage.item_has_annotations(item));
}

#[test]
fn bind_rejects_undeclared_or_mistyped_keys() {
    let layer = freq_layer();
    let mut missing = SingleKeyLongStorage::new("lemma", StorageOptions::new());
    assert!(matches!(
        missing.bind(&layer),
        Err(LemmaError::InvalidKey(_))
    ));

    let mut mistyped = SingleKeyStringStorage::new("freq", StorageOptions::new());
    assert!(matches!(
        mistyped.bind(&layer),
        Err(LemmaError::TypeMismatch(_))
    ));
}

#[test]
fn remove_all_values_resets_the_storage() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    for id in 0..10 {
        storage.set_long_value(ItemId(id), "freq", id as i64 + 1).expect("write");
    }
    assert!(storage.has_annotations());

    storage.remove_all_values().expect("clear");
    assert!(!storage.has_annotations());
    assert!(!storage.contains_item(ItemId(0)));
    assert_eq!(storage.long_value(ItemId(0), "freq").expect("read"), -1);
}

#[test]
fn remove_item_values_clears_only_the_given_items() {
    let layer = freq_layer();
    let mut storage = SingleKeyLongStorage::new("freq", StorageOptions::new());
    storage.bind(&layer).expect("bind");
    for id in 0..4 {
        storage.set_long_value(ItemId(id), "freq", 7).expect("write");
    }

    let mut doomed = [ItemId(0), ItemId(2)].into_iter();
    storage.remove_item_values(&mut doomed).expect("bulk remove");

    assert!(!storage.item_has_annotations(ItemId(0)));
    assert!(storage.item_has_annotations(ItemId(1)));
    assert!(!storage.item_has_annotations(ItemId(2)));
    assert!(storage.item_has_annotations(ItemId(3)));
}
