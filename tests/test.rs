use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use rbtree_containers::{OrderedMap, OrderedSet, Outcome, Tree};
use std::collections::BTreeMap;

const ROUNDS: usize = 4000;

/// Drives a `Tree<i64, i64>` and a `BTreeMap<i64, i64>` through the same
/// random sequence of inserts and removals, asserting they always agree.
/// Grounded on the teacher's `simulate` harness shape in spirit, without the
/// fixed-capacity/zero-copy plumbing this crate has no use for.
#[test]
fn random_insert_remove_matches_btreemap() {
    let mut rng = thread_rng();
    let mut tree: Tree<i64, i64> = Tree::new();
    let mut oracle: BTreeMap<i64, i64> = BTreeMap::new();
    let mut keys_seen = vec![];

    for round in 0..ROUNDS {
        if oracle.is_empty() || rng.gen_bool(0.7) {
            let k = rng.gen_range(0..(ROUNDS as i64) * 2);
            let v = rng.gen::<i64>();
            let tree_outcome = tree.insert(k, v);
            let oracle_outcome = oracle.insert(k, v);
            match (tree_outcome, oracle_outcome) {
                (Outcome::Inserted, None) => {}
                (Outcome::Replaced(old), Some(expected_old)) => assert_eq!(old, expected_old),
                (outcome, oracle_outcome) => {
                    panic!("round {round}: tree said {outcome:?}, oracle said {oracle_outcome:?}")
                }
            }
            keys_seen.push(k);
        } else {
            let &k = keys_seen.choose(&mut rng).unwrap();
            assert_eq!(tree.remove_by_key(&k), oracle.remove(&k));
        }
        assert!(tree.is_valid(), "round {round}: red-black invariants broken");
        assert_eq!(tree.size(), oracle.len());
    }

    let tree_sorted: Vec<(i64, i64)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
    let oracle_sorted: Vec<(i64, i64)> = oracle.into_iter().collect();
    assert_eq!(tree_sorted, oracle_sorted);
}

#[test]
fn rank_matches_position_in_sorted_order() {
    let mut rng = thread_rng();
    let mut keys: Vec<i32> = (0..2000).collect();
    keys.shuffle(&mut rng);

    let mut tree: Tree<i32, ()> = Tree::new();
    for &k in &keys {
        tree.insert(k, ());
    }
    assert!(tree.is_valid());

    for (expected_rank, k) in (0..2000).sorted().enumerate() {
        let node = tree.find(&k).unwrap();
        assert_eq!(tree.index_of(node).unwrap(), expected_rank);
        let idx = tree.node_at_index(expected_rank).unwrap();
        assert_eq!(*tree.get_key_value(idx).0, k);
    }
}

#[test]
fn deep_copy_is_independent_of_source() {
    let mut tree: Tree<i32, String> = Tree::with_track_order(true);
    for k in [5, 1, 9, 3, 7, 2, 8] {
        tree.insert(k, k.to_string());
    }
    let copy = tree.deep_copy();

    tree.insert(100, "hundred".to_string());
    tree.remove_by_key(&5);

    assert_eq!(copy.size(), 7);
    assert!(copy.contains(&5));
    assert!(!copy.contains(&100));

    let original_order: Vec<i32> = tree.insertion_order_iter().unwrap().map(|(k, _)| *k).collect();
    let copy_order: Vec<i32> = copy.insertion_order_iter().unwrap().map(|(k, _)| *k).collect();
    assert_eq!(copy_order, vec![5, 1, 9, 3, 7, 2, 8]);
    assert_ne!(original_order, copy_order);
}

#[test]
fn deep_copy_parallel_matches_sequential() {
    let mut tree: Tree<i32, i32> = Tree::new();
    for k in 0..3000 {
        tree.insert(k, k * 2);
    }
    let sequential = tree.deep_copy();
    let parallel = tree.deep_copy_parallel(64);
    assert!(sequential == parallel, "parallel deep copy diverged from sequential deep copy");
}

#[test]
fn fail_fast_iterator_reports_invalidation_on_11th_call() {
    let mut tree: Tree<i32, i32> = Tree::new();
    for k in 0..50 {
        tree.insert(k, k);
    }
    let mut iter = tree.iter();
    for _ in 0..10 {
        assert!(iter.next().is_some());
    }
    tree.remove_by_key(&0);
    assert_eq!(iter.next(), None, "11th call should observe the structural change");
    assert!(iter.was_invalidated());
}

#[test]
fn ordered_set_algebra_against_btreeset() {
    use std::collections::BTreeSet;

    let mut rng = thread_rng();
    let a_keys: Vec<i32> = (0..200).filter(|_| rng.gen_bool(0.5)).collect();
    let b_keys: Vec<i32> = (0..200).filter(|_| rng.gen_bool(0.5)).collect();

    let mut a = OrderedSet::new();
    let mut b = OrderedSet::new();
    for &k in &a_keys {
        a.insert(k);
    }
    for &k in &b_keys {
        b.insert(k);
    }

    let oracle_a: BTreeSet<i32> = a_keys.into_iter().collect();
    let oracle_b: BTreeSet<i32> = b_keys.into_iter().collect();

    let union: Vec<i32> = a.union(&b).iter().copied().collect();
    let expected_union: Vec<i32> = oracle_a.union(&oracle_b).copied().collect();
    assert_eq!(union, expected_union);

    let intersection: Vec<i32> = a.intersection(&b).iter().copied().collect();
    let expected_intersection: Vec<i32> = oracle_a.intersection(&oracle_b).copied().collect();
    assert_eq!(intersection, expected_intersection);
}

#[test]
fn ordered_map_merge_and_rank() {
    let mut a = OrderedMap::new();
    for k in [1, 3, 5, 7] {
        a.insert(k, k * 10);
    }
    let mut b = OrderedMap::new();
    for k in [5, 6, 7, 8] {
        b.insert(k, k * 100);
    }
    let merged = a.merge(&b);
    assert_eq!(merged.get(&1), Some(&10));
    assert_eq!(merged.get(&5), Some(&500));
    assert_eq!(merged.get(&8), Some(&800));
    assert_eq!(merged.rank(&7), Some(3));
}

#[test]
fn concurrent_tree_survives_eight_writers_and_eight_readers() {
    use rbtree_containers::ConcurrentTree;
    use std::sync::Arc;

    let tree = Arc::new(ConcurrentTree::<i32, i32>::new());
    std::thread::scope(|scope| {
        for writer in 0..8 {
            let tree = Arc::clone(&tree);
            scope.spawn(move || {
                for i in 0..200 {
                    tree.insert(writer * 200 + i, i);
                }
            });
        }
        for _ in 0..8 {
            let tree = Arc::clone(&tree);
            scope.spawn(move || {
                for _ in 0..500 {
                    let _ = tree.size();
                }
            });
        }
    });
    assert_eq!(tree.size(), 1600);
}
