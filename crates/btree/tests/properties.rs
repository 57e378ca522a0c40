//! Model-based property tests: every tree must agree with a `BTreeMap`.

use std::collections::BTreeMap;

use btree::{MemoryTree, NodeLayout, NodeStore, PagedTree};
use codec::Codec;
use proptest::prelude::*;
use storage::MemoryPageStore;
use testsupport::proptest_generators::{arb_distinct_keys, arb_ops, arb_text, TreeOp};
use types::Value;

fn apply<S: NodeStore<i64>>(
    tree: &mut btree::BPlusTree<i64, S>,
    model: &mut BTreeMap<i64, i64>,
    op: &TreeOp,
) -> Result<(), TestCaseError> {
    match *op {
        TreeOp::Insert(k, v) => {
            let previous = tree.insert(&Value::Int(k), v).unwrap();
            prop_assert_eq!(previous, model.insert(k, v));
        }
        TreeOp::Delete(k) => {
            let removed = tree.delete(&Value::Int(k)).unwrap();
            prop_assert_eq!(removed, model.remove(&k));
        }
    }
    Ok(())
}

fn contents<S: NodeStore<i64>>(tree: &btree::BPlusTree<i64, S>) -> Vec<(i64, i64)> {
    tree.scan_all()
        .unwrap()
        .into_iter()
        .map(|(k, v)| (k.as_int().unwrap(), v))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_memory_tree_matches_model(order in 3usize..9, ops in arb_ops(300)) {
        let mut tree = MemoryTree::in_memory(Codec::int(), order).unwrap();
        let mut model = BTreeMap::new();
        for op in &ops {
            apply(&mut tree, &mut model, op)?;
            prop_assert!(tree.verify().is_ok(), "{:?}", tree.verify());
        }
        prop_assert_eq!(contents(&tree), model.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_paged_tree_matches_model(order in 3usize..9, ops in arb_ops(200)) {
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap().with_order(order).unwrap();
        let mut tree: PagedTree<_, i64> =
            PagedTree::create(MemoryPageStore::new(128).unwrap(), layout).unwrap();
        let mut model = BTreeMap::new();
        for op in &ops {
            apply(&mut tree, &mut model, op)?;
        }
        tree.verify().unwrap();
        prop_assert_eq!(contents(&tree), model.into_iter().collect::<Vec<_>>());

        // Rehydrating from the same pages yields the same tree.
        let before = tree.snapshot().unwrap();
        let pages = tree.into_store().into_pages();
        let reopened: PagedTree<_, i64> = PagedTree::open(pages, Codec::int(), 8).unwrap();
        prop_assert_eq!(reopened.snapshot().unwrap(), before);
    }

    #[test]
    fn prop_in_order_traversal_is_strictly_increasing(keys in arb_distinct_keys(200)) {
        let mut tree = MemoryTree::in_memory(Codec::int(), 4).unwrap();
        for &k in &keys {
            tree.insert(&Value::Int(k), k).unwrap();
        }
        let scanned: Vec<i64> = contents(&tree).into_iter().map(|(k, _)| k).collect();
        prop_assert!(scanned.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(scanned.len(), keys.len());
    }

    #[test]
    fn prop_untouched_keys_keep_their_values(
        keys in arb_distinct_keys(120),
        split in 0usize..120,
    ) {
        let mut tree = MemoryTree::in_memory(Codec::int(), 5).unwrap();
        for &k in &keys {
            tree.insert(&Value::Int(k), k * 3).unwrap();
        }
        let split = split.min(keys.len());
        let (gone, kept) = keys.split_at(split);
        for &k in gone {
            prop_assert_eq!(tree.delete(&Value::Int(k)).unwrap(), Some(k * 3));
            prop_assert_eq!(tree.delete(&Value::Int(k)).unwrap(), None);
        }
        for &k in gone {
            prop_assert_eq!(tree.search(&Value::Int(k)).unwrap(), None);
        }
        for &k in kept {
            prop_assert_eq!(tree.search(&Value::Int(k)).unwrap(), Some(k * 3));
        }
        tree.verify().unwrap();
    }

    #[test]
    fn prop_text_keys_scan_in_byte_order(words in prop::collection::btree_set(arb_text(10), 0..80)) {
        let mut tree = MemoryTree::in_memory(Codec::text(10).unwrap(), 4).unwrap();
        for (i, w) in words.iter().enumerate() {
            tree.insert(&Value::Text(w.clone()), i as i64).unwrap();
        }
        tree.verify().unwrap();
        let scanned: Vec<String> = tree
            .scan_all()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        prop_assert_eq!(scanned, words.into_iter().collect::<Vec<_>>());
    }
}
