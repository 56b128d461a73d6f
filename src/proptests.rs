use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, HashSet};

/// Structural check: every allocated node reachable exactly once, one value
/// node per key.
pub(crate) fn validate_tree(t: &TernaryTree) {
    let mut stack: Vec<Handle> = Vec::new();
    if t.root != NIL {
        stack.push(t.root);
    }

    let mut seen: HashSet<Handle> = HashSet::new();
    let mut value_nodes = 0usize;
    while let Some(h) = stack.pop() {
        assert!((h as usize) < t.nodes.cursor(), "handle {h} past allocation cursor");
        assert!(seen.insert(h), "node {h} reachable twice");

        match t.nodes.node(h) {
            Node::Branch {
                split,
                low,
                equal,
                high,
            } => {
                assert!(split != TERMINATOR && split != COMPRESSED);
                assert_ne!(equal, NIL, "branch without continuation");
                for child in [low, equal, high] {
                    if child != NIL {
                        stack.push(child);
                    }
                }
            }
            Node::Terminal { high, .. } => {
                value_nodes += 1;
                if high != NIL {
                    stack.push(high);
                }
            }
            Node::Compressed { tail, .. } => {
                value_nodes += 1;
                let suffix = t.tail.tail(tail);
                assert!(!suffix.is_empty(), "compressed node with empty tail");
                assert!(!suffix.contains(&COMPRESSED));
            }
        }
    }

    assert_eq!(value_nodes, t.len(), "value nodes must match key count");
    assert_eq!(seen.len(), t.node_count(), "every allocated node is reachable");
}

fn key_strategy() -> BoxedStrategy<Vec<u16>> {
    // Mostly a tiny alphabet so keys share prefixes and decompress each
    // other; occasionally any non-reserved unit.
    let unit = prop_oneof![
        8 => 0x61u16..=0x64,
        1 => 1u16..0xFFFF,
    ];
    prop::collection::vec(unit, 0..=8).boxed()
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 50)]
    Insert(#[proptest(strategy = "key_strategy()")] Vec<u16>, u16),
    #[proptest(weight = 30)]
    Find(#[proptest(strategy = "key_strategy()")] Vec<u16>),
    #[proptest(weight = 2)]
    Balance,
    #[proptest(weight = 2)]
    Compact,
    #[proptest(weight = 1)]
    Duplicate,
}

fn entries(m: &BTreeMap<Vec<u16>, u16>) -> Vec<(Vec<u16>, u16)> {
    m.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=500)) {
        let mut t = TernaryTree::new();
        let mut m: BTreeMap<Vec<u16>, u16> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = t.insert_units(&key, value).unwrap();
                    let old_m = m.insert(key.clone(), value);
                    prop_assert_eq!(old_t, old_m);
                    prop_assert_eq!(t.find_units(&key), Some(value));
                }
                Op::Find(key) => {
                    prop_assert_eq!(t.find_units(&key), m.get(&key).copied());
                }
                Op::Balance => t.balance().unwrap(),
                Op::Compact => t.compact().unwrap(),
                Op::Duplicate => t = t.clone(),
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(Vec<u16>, u16)> = t.iter().collect();
        prop_assert_eq!(got, entries(&m));
    }

    #[test]
    fn prop_trim_preserves_mapping(
        pairs in prop::collection::vec((key_strategy(), any::<u16>()), 0..=300)
    ) {
        let mut t = TernaryTree::new();
        let mut m: BTreeMap<Vec<u16>, u16> = BTreeMap::new();
        for (k, v) in pairs {
            t.insert_units(&k, v).unwrap();
            m.insert(k, v);
        }

        let before: Vec<(Vec<u16>, u16)> = t.iter().collect();

        // Compaction alone never grows the tail buffer.
        let mut compacted = t.clone();
        compacted.compact().unwrap();
        validate_tree(&compacted);
        prop_assert!(compacted.tail_len() <= t.tail_len());
        prop_assert_eq!(compacted.iter().collect::<Vec<_>>(), before.clone());

        t.trim_to_size().unwrap();
        validate_tree(&t);

        let after: Vec<(Vec<u16>, u16)> = t.iter().collect();
        prop_assert_eq!(&before, &after);
        prop_assert_eq!(after, entries(&m));
        prop_assert_eq!(t.stats().node_capacity, t.node_count() + 1);
        for (k, v) in &m {
            prop_assert_eq!(t.find_units(k), Some(*v));
        }
    }

    #[test]
    fn prop_prefixes_and_extensions_not_found(
        keys in prop::collection::vec(key_strategy(), 1..=50),
        ext in 1u16..0xFFFF,
    ) {
        let mut t = TernaryTree::new();
        let stored: HashSet<Vec<u16>> = keys.iter().cloned().collect();
        for k in &keys {
            t.insert_units(k, 1).unwrap();
        }
        for k in &keys {
            for len in 0..k.len() {
                let prefix = &k[..len];
                prop_assert_eq!(t.contains_units(prefix), stored.contains(prefix));
            }
            let mut longer = k.clone();
            longer.push(ext);
            prop_assert_eq!(t.contains_units(&longer), stored.contains(&longer));
        }
    }

    #[test]
    fn prop_clone_is_independent(
        base in prop::collection::vec((key_strategy(), any::<u16>()), 0..=100),
        extra in prop::collection::vec((key_strategy(), any::<u16>()), 1..=100),
    ) {
        let mut t = TernaryTree::new();
        for (k, v) in &base {
            t.insert_units(k, *v).unwrap();
        }
        let snapshot: Vec<(Vec<u16>, u16)> = t.iter().collect();

        let mut c = t.clone();
        prop_assert_eq!(c.iter().collect::<Vec<_>>(), snapshot.clone());
        for (k, v) in &extra {
            c.insert_units(k, *v).unwrap();
        }
        c.trim_to_size().unwrap();

        prop_assert_eq!(t.iter().collect::<Vec<_>>(), snapshot);
        validate_tree(&t);
        validate_tree(&c);
    }
}

#[test]
fn randomized_against_btreemap() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(1);
    let mut t = TernaryTree::new();
    let mut m: BTreeMap<Vec<u16>, u16> = BTreeMap::new();

    // Pattern-like keys: short, over a small alphabet, with '.' word edges.
    let alphabet: Vec<u16> = "abcdefghijklmnopqrstuvwxyz.".encode_utf16().collect();
    for _ in 0..5000 {
        let len = rng.gen_range(1..=6);
        let key: Vec<u16> = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        let v: u16 = rng.gen();
        assert_eq!(t.insert_units(&key, v).unwrap(), m.insert(key, v));
    }

    validate_tree(&t);
    t.trim_to_size().unwrap();
    validate_tree(&t);
    assert_eq!(t.len(), m.len());
    let got: Vec<(Vec<u16>, u16)> = t.iter().collect();
    assert_eq!(got, entries(&m));
}

/// Calls `f` with every ordering of `items` (Heap's algorithm, iterative).
fn permutations<T: Clone>(items: &[T], mut f: impl FnMut(&[T])) {
    let mut perm = items.to_vec();
    let mut counters = vec![0usize; perm.len()];
    f(&perm);
    let mut i = 1;
    while i < perm.len() {
        if counters[i] < i {
            let j = if i % 2 == 0 { 0 } else { counters[i] };
            perm.swap(j, i);
            f(&perm);
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = ["", "a", "b", "ab", "abc", "abd", "ba"];

    let mut seen = HashSet::new();
    permutations(&keys, |perm| {
        assert!(seen.insert(perm.to_vec()), "ordering visited twice");
        let mut t = TernaryTree::new();
        let mut m: BTreeMap<Vec<u16>, u16> = BTreeMap::new();

        for (i, k) in perm.iter().enumerate() {
            let units: Vec<u16> = k.encode_utf16().collect();
            let v = i as u16;
            assert_eq!(t.insert_units(&units, v).unwrap(), m.insert(units, v));
        }

        validate_tree(&t);
        let got: Vec<(Vec<u16>, u16)> = t.iter().collect();
        assert_eq!(got, entries(&m));

        t.trim_to_size().unwrap();
        validate_tree(&t);
        let got: Vec<(Vec<u16>, u16)> = t.iter().collect();
        assert_eq!(got, entries(&m));
    });
    // 7!
    assert_eq!(seen.len(), 5040);
}

#[test]
fn exhaustive_overwrite_order_small_set() {
    let keys = ["ca", "car", "cart", "cat", "c"];

    // Build once, then overwrite in every order: shape may change through
    // decompression, but the key set and count must not.
    let mut base = TernaryTree::new();
    for k in keys {
        base.insert(k, 0).unwrap();
    }

    permutations(&keys, |perm| {
        let mut t = base.clone();
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(t.insert(k, i as u16 + 1).unwrap(), Some(0));
            assert_eq!(t.len(), keys.len());
            validate_tree(&t);
        }
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(t.find(k), Some(i as u16 + 1));
        }
    });
}
