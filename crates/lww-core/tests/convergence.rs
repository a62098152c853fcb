//! Convergence properties of the LWW element set.
//!
//! Replicas that see the same operations, in any order or split across
//! replicas and merged afterwards, must end up with the same members.

use chrono::{DateTime, Duration};
use lww_core::{ElementSet, TimedSet, Timestamp};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(u8, i64),
    Remove(u8, i64),
}

fn ts(micros: i64) -> Timestamp {
    DateTime::from_timestamp(1_500_000_000, 0).unwrap() + Duration::microseconds(micros)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, 0i64..50).prop_map(|(v, t)| Op::Add(v, t)),
        (0u8..8, 0i64..50).prop_map(|(v, t)| Op::Remove(v, t)),
    ]
}

fn apply(set: &ElementSet<u8>, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Add(v, t) => set.add(&v, ts(t)).unwrap(),
            Op::Remove(v, t) => set.remove(&v, ts(t)).unwrap(),
        };
    }
}

fn members(set: &ElementSet<u8>) -> BTreeSet<u8> {
    set.get().unwrap().into_iter().collect()
}

/// Membership computed directly from the newest add and remove per value
fn model(ops: &[Op]) -> BTreeSet<u8> {
    let mut added: HashMap<u8, i64> = HashMap::new();
    let mut removed: HashMap<u8, i64> = HashMap::new();
    for op in ops {
        match *op {
            Op::Add(v, t) => {
                let e = added.entry(v).or_insert(t);
                *e = (*e).max(t);
            }
            Op::Remove(v, t) => {
                let e = removed.entry(v).or_insert(t);
                *e = (*e).max(t);
            }
        }
    }
    added
        .into_iter()
        .filter(|(v, a)| removed.get(v).map_or(true, |r| a >= r))
        .map(|(v, _)| v)
        .collect()
}

proptest! {
    #[test]
    fn order_of_operations_does_not_matter(ops in prop::collection::vec(op(), 0..60)) {
        let forward = ElementSet::new();
        apply(&forward, &ops);

        let mut reversed_ops = ops.clone();
        reversed_ops.reverse();
        let backward = ElementSet::new();
        apply(&backward, &reversed_ops);

        prop_assert_eq!(members(&forward), members(&backward));
        prop_assert_eq!(members(&forward), model(&ops));
    }

    #[test]
    fn exists_agrees_with_get(ops in prop::collection::vec(op(), 0..60)) {
        let set = ElementSet::new();
        apply(&set, &ops);

        let present = members(&set);
        for v in 0u8..8 {
            prop_assert_eq!(set.exists(&v).unwrap(), present.contains(&v));
        }
    }

    #[test]
    fn split_replicas_converge_after_merge(
        ops in prop::collection::vec(op(), 0..60),
        split in 0usize..60,
    ) {
        let split = split.min(ops.len());
        let (left_ops, right_ops) = ops.split_at(split);

        let left = ElementSet::new();
        let right = ElementSet::new();
        apply(&left, left_ops);
        apply(&right, right_ops);

        left.merge(&right).unwrap();
        right.merge(&left).unwrap();

        prop_assert_eq!(members(&left), members(&right));
        prop_assert_eq!(members(&left), model(&ops));
    }
}

#[test]
fn concurrent_adds_keep_the_latest_timestamp() {
    for round in 0..100 {
        let set = Arc::new(ElementSet::<String>::new());
        let early = ts(round);
        let late = ts(round + 1);

        std::thread::scope(|s| {
            for at in [late, early] {
                let set = Arc::clone(&set);
                s.spawn(move || set.add(&"v".to_string(), at).unwrap());
            }
        });

        assert_eq!(set.additions().lookup(&"v".to_string()).unwrap(), Some(late));
    }
}

#[test]
fn concurrent_add_and_remove_resolve_deterministically() {
    for round in 0..100 {
        let set = ElementSet::<String>::new();
        let value = "Montreal".to_string();

        std::thread::scope(|s| {
            s.spawn(|| set.add(&value, ts(round)).unwrap());
            s.spawn(|| set.remove(&value, ts(round + 1)).unwrap());
            s.spawn(|| set.add(&value, ts(round - 1)).unwrap());
        });

        assert!(!set.exists(&value).unwrap());
    }
}
