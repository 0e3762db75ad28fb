//! Property-Based Tests for Inventory Module
//!
//! Uses proptest to check store behaviour over generated records.

use proptest::prelude::*;

use crate::events::Notifier;
use crate::inventory::{matches_filter, RecordFields, RecordStore};

// == Strategies ==
/// Generates record names (mixed case, may contain spaces)
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,24}".prop_map(|s| s)
}

/// Generates prices with cent precision
fn price_strategy() -> impl Strategy<Value = f64> {
    (0u32..1_000_000).prop_map(|cents| cents as f64 / 100.0)
}

fn image_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[A-Za-z0-9+/]{4,64}".prop_map(|b| format!("data:image/jpeg;base64,{}", b)))
}

fn fields_strategy() -> impl Strategy<Value = RecordFields> {
    (name_strategy(), price_strategy(), image_strategy())
        .prop_map(|(name, price, image)| RecordFields::new(name, price, image))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property: Search Is Case-Insensitive**
    // A name matches a filter exactly when it matches the upper- or
    // lower-cased form of that filter.
    #[test]
    fn prop_filter_ignores_case(name in name_strategy(), filter in "[a-zA-Z]{0,4}") {
        let expected = name.to_lowercase().contains(&filter.to_lowercase());
        prop_assert_eq!(matches_filter(&name, &filter), expected);
        prop_assert_eq!(matches_filter(&name, &filter.to_uppercase()), expected);
        prop_assert_eq!(matches_filter(&name.to_uppercase(), &filter), expected);
    }

    // **Property: Substring Of Name Always Matches**
    #[test]
    fn prop_name_slice_matches(name in name_strategy(), start in 0usize..8, len in 0usize..8) {
        let start = start.min(name.len());
        let end = (start + len).min(name.len());
        prop_assert!(matches_filter(&name, &name[start..end]));
    }
}

// Store-backed properties open a database per case, so fewer cases
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // **Property: Create/Get Round Trip**
    // Reading a freshly created record returns every supplied field.
    #[test]
    fn prop_create_get_roundtrip(fields in fields_strategy()) {
        let record = tokio_test::block_on(async {
            let store = RecordStore::in_memory(Notifier::new()).await.unwrap();
            let id = store.create(fields.clone()).await.unwrap();
            store.get(id).await.unwrap().map(|r| (id, r))
        });

        let (id, record) = record.expect("created record should exist");
        prop_assert_eq!(record.id, id);
        prop_assert_eq!(RecordFields::from(record), fields);
    }

    // **Property: Update Preserves Identity**
    // Updating never changes the id, and omitting the image keeps it.
    #[test]
    fn prop_update_preserves_identity(
        original in fields_strategy(),
        name in name_strategy(),
        price in price_strategy()
    ) {
        let (id, updated) = tokio_test::block_on(async {
            let store = RecordStore::in_memory(Notifier::new()).await.unwrap();
            let id = store.create(original.clone()).await.unwrap();
            store
                .update(id, RecordFields::new(name.clone(), price, None))
                .await
                .unwrap();
            (id, store.get(id).await.unwrap().unwrap())
        });

        prop_assert_eq!(updated.id, id);
        prop_assert_eq!(updated.name, name);
        prop_assert_eq!(updated.price, price);
        prop_assert_eq!(updated.image, original.image);
    }

    // **Property: List Returns Exactly The Matching Records**
    #[test]
    fn prop_list_matches_filter(
        entries in prop::collection::vec(fields_strategy(), 0..12),
        filter in "[a-zA-Z]{0,2}"
    ) {
        let listed = tokio_test::block_on(async {
            let store = RecordStore::in_memory(Notifier::new()).await.unwrap();
            for fields in &entries {
                store.create(fields.clone()).await.unwrap();
            }
            store.list(&filter).await.unwrap()
        });

        let expected: Vec<&String> = entries
            .iter()
            .map(|f| &f.name)
            .filter(|name| matches_filter(name, &filter))
            .collect();
        let actual: Vec<&String> = listed.iter().map(|r| &r.name).collect();
        prop_assert_eq!(actual, expected);
    }
}
