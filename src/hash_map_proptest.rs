#![cfg(test)]

// Property tests for the hash containers kept inside the crate so they
// can inspect the bucket store and the linked list directly.

use crate::hash_map::HashMap;
use crate::linked_hash_map::{LinkedHashMap, Order};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap as StdHashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations shrink toward earlier keys and shorter runs.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertNull(i32),
    Remove(usize),
    RemoveNull,
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    CursorRemove(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            1 => any::<i32>().prop_map(OpI::InsertNull),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => Just(OpI::RemoveNull),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (0usize..16).prop_map(OpI::CursorRemove),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: std HashMap for ordinary keys plus an Option for the null key.
fn run_state_machine<S: BuildHasher>(
    mut sut: HashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: StdHashMap<Key, i32> = StdHashMap::new();
    let mut null: Option<i32> = None;

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let before = sut.store.mods().count();
                let prev = sut.insert(k.clone(), v);
                let existed = prev.is_some();
                prop_assert_eq!(prev, model.insert(k, v));
                if existed {
                    prop_assert_eq!(
                        sut.store.mods().count(),
                        before,
                        "value replacement is not structural"
                    );
                }
            }
            OpI::InsertNull(v) => {
                prop_assert_eq!(sut.insert_null(v), null.replace(v));
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            OpI::RemoveNull => {
                prop_assert_eq!(sut.remove_null(), null.take());
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.saturating_add(d);
                }
                if let Some(mv) = model.get_mut(&k) {
                    *mv = mv.saturating_add(d);
                }
            }
            OpI::CursorRemove(n) => {
                // Remove the n-th entry in cursor order, if there is one.
                let mut c = sut.cursor();
                let mut victim = None;
                for _ in 0..=n {
                    match c.next(&sut).map_err(|e| TestCaseError::fail(e.to_string()))? {
                        Some((k, _)) => victim = Some(k.cloned()),
                        None => {
                            victim = None;
                            break;
                        }
                    }
                }
                if let Some(k) = victim {
                    let (rk, rv) = c
                        .remove(&mut sut)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(&rk, &k);
                    let mv = match k {
                        None => null.take(),
                        Some(k) => model.remove(&k),
                    };
                    prop_assert_eq!(Some(rv), mv);
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                null = None;
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().flatten().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                let nulls = sut.iter().filter(|(k, _)| k.is_none()).count();
                prop_assert_eq!(nulls, null.iter().count());
            }
        }

        // Post-conditions after each op
        let expected_len = model.len() + usize::from(null.is_some());
        prop_assert_eq!(sut.len(), expected_len);
        prop_assert_eq!(sut.iter().len(), expected_len);
        prop_assert_eq!(sut.get_null(), null.as_ref());
        let cap = sut.capacity();
        prop_assert!(cap == 0 || cap.is_power_of_two());
        // The null slot can sit one past the threshold; it never triggers a resize.
        prop_assert!(cap == 0 || sut.len() <= cap * 3 / 4 + 1);
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `insert` returns the replaced value and never bumps the modification
//   count when it only replaces.
// - Lookup and borrowed lookup parity; the null key behaves like one
//   extra entry.
// - Cursor removal takes out exactly the entry it last reported.
// - `len`, iteration length and the key set agree with the model; the
//   table stays a power of two within its load factor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(HashMap::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants under worst-case collisions, which stresses
// chain splicing on removal and order-preserving rehash.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(HashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: a LinkedHashMap in insertion order iterates exactly like a
// Vec model that appends new keys and drops removed ones; the circular
// list stays consistent after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_linked_insertion_order((pool, ops) in arb_scenario()) {
        let mut sut: LinkedHashMap<Key, i32> = LinkedHashMap::with_order(Order::Insertion);
        let mut model: Vec<(Option<Key>, i32)> = Vec::new();
        for op in ops {
            match op {
                OpI::Insert(i, v) => {
                    let k = Some(key_from(&pool, i));
                    sut.insert(k.clone().unwrap(), v);
                    match model.iter_mut().find(|(mk, _)| *mk == k) {
                        Some(slot) => slot.1 = v,
                        None => model.push((k, v)),
                    }
                }
                OpI::InsertNull(v) => {
                    sut.insert_null(v);
                    match model.iter_mut().find(|(mk, _)| mk.is_none()) {
                        Some(slot) => slot.1 = v,
                        None => model.push((None, v)),
                    }
                }
                OpI::Remove(i) => {
                    let k = key_from(&pool, i);
                    sut.remove(&k);
                    model.retain(|(mk, _)| mk.as_ref() != Some(&k));
                }
                OpI::RemoveNull => {
                    sut.remove_null();
                    model.retain(|(mk, _)| mk.is_some());
                }
                OpI::Clear => {
                    sut.clear();
                    model.clear();
                }
                OpI::Get(i) => {
                    let k = key_from(&pool, i);
                    let want = model.iter().find(|(mk, _)| mk.as_ref() == Some(&k)).map(|(_, v)| v);
                    prop_assert_eq!(sut.get(&k), want);
                }
                _ => {}
            }
            sut.assert_links_consistent();
            let got: Vec<(Option<Key>, i32)> = sut.iter().map(|(k, v)| (k.cloned(), *v)).collect();
            prop_assert_eq!(&got, &model);
        }
    }
}
