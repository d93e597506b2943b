//! Property tests for B-Tree structural invariants.

use std::collections::BTreeSet;

use dbviz_core::Probe;
use dbviz_engines::btree::BTree;
use proptest::prelude::*;

fn order_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(3usize), Just(4), Just(5), Just(6), Just(8), Just(16)]
}

fn build(order: usize, keys: &[i64]) -> BTree {
    let mut tree = BTree::new(order);
    let mut probe = Probe::silent();
    for &k in keys {
        tree.insert(k, &mut probe);
        tree.check_invariants().unwrap();
    }
    tree
}

proptest! {
    #[test]
    fn inserts_keep_node_sizes_and_leaf_depth(
        order in order_strategy(),
        keys in prop::collection::vec(-500i64..500, 0..120),
    ) {
        let tree = build(order, &keys);
        let expected: Vec<i64> = keys.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        prop_assert_eq!(tree.keys(), expected);
    }

    #[test]
    fn deleting_every_key_empties_the_tree(
        order in order_strategy(),
        keys in prop::collection::btree_set(0i64..1000, 1..80),
        shuffle_seed in any::<u64>(),
    ) {
        let keys: Vec<i64> = keys.into_iter().collect();
        let mut tree = build(order, &keys);

        let mut order_of_deletion = keys.clone();
        let len = order_of_deletion.len();
        let mut s = shuffle_seed;
        for i in (1..len).rev() {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (s >> 33) as usize % (i + 1);
            order_of_deletion.swap(i, j);
        }

        let mut probe = Probe::silent();
        for k in &order_of_deletion {
            prop_assert!(tree.delete(*k, &mut probe));
            tree.check_invariants().map_err(TestCaseError::fail)?;
        }
        prop_assert!(tree.is_empty());
        prop_assert!(tree.root_id().is_none());
        prop_assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn range_search_matches_filter(
        keys in prop::collection::btree_set(0i64..300, 0..60),
        lo in 0i64..300,
        width in 0i64..150,
    ) {
        let keys: Vec<i64> = keys.into_iter().collect();
        let mut tree = build(4, &keys);
        let hi = lo + width;
        let got = tree.range_search(lo, hi, &mut Probe::silent());
        let want: Vec<i64> = keys.iter().copied().filter(|k| (lo..=hi).contains(k)).collect();
        prop_assert_eq!(got, want);
    }
}
