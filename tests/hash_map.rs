// HashMap / HashSet integration suite.
//
// Core behaviors exercised through the public API:
// - Replacement keeps size and the original key.
// - The null key is one extra mapping, reported as `None`.
// - Cursors fail fast on foreign structural changes and stay valid across
//   their own removals.
// - Key-set views reject insertion without side effects.
use chained_collections::{Error, HashMap, HashSet, MapConfig};

// Test: the canonical replace scenario.
// Verifies: len 2, a -> 3, b -> 2.
#[test]
fn insert_replace_keeps_size() {
    let mut m = HashMap::new();
    m.insert("a", 1);
    m.insert("b", 2);
    assert_eq!(m.insert("a", 3), Some(1));
    assert_eq!(m.len(), 2);
    assert_eq!(m.get("a"), Some(&3));
    assert_eq!(m.get("b"), Some(&2));
}

// Test: cursor invalidation by direct mutation.
// Assumes: insert of a new key and remove are structural.
// Verifies: the next advance reports ConcurrentModification, repeatedly.
#[test]
fn cursor_fails_fast_after_direct_insert_or_remove() {
    let mut m: HashMap<i32, i32> = (0..8).map(|i| (i, i)).collect();

    let mut c = m.cursor();
    assert!(c.next(&m).unwrap().is_some());
    m.insert(100, 100);
    assert_eq!(c.next(&m), Err(Error::ConcurrentModification));
    assert_eq!(c.next(&m), Err(Error::ConcurrentModification));

    let mut c = m.cursor();
    assert!(c.next(&m).unwrap().is_some());
    m.remove(&100);
    assert_eq!(c.remove(&mut m), Err(Error::ConcurrentModification));
}

// Test: replacing a value under a live cursor.
// Verifies: replacement is not structural, so the cursor keeps going.
#[test]
fn cursor_survives_value_replacement() {
    let mut m: HashMap<i32, i32> = (0..8).map(|i| (i, i)).collect();
    let mut c = m.cursor();
    let mut seen = 0;
    while let Some((k, _)) = c.next(&m).unwrap() {
        let k = *k.unwrap();
        m.insert(k, -1);
        seen += 1;
    }
    assert_eq!(seen, 8);
    assert!(m.values().all(|v| *v == -1));
}

// Test: draining through a cursor.
// Verifies: every entry (null key included) is reported once and removed.
#[test]
fn cursor_can_drain_the_map() {
    let mut m: HashMap<String, usize> = (0..200).map(|i| (format!("k{i}"), i)).collect();
    m.insert_null(999);
    let mut c = m.cursor();
    let mut removed = 0;
    while c.next(&m).unwrap().is_some() {
        c.remove(&mut m).unwrap();
        removed += 1;
    }
    assert_eq!(removed, 201);
    assert!(m.is_empty());
    assert!(matches!(c.remove(&mut m), Err(Error::IllegalState(_))));
}

// Test: clear semantics for cursors.
// Verifies: clearing an empty map is not structural; clearing a non-empty
// one is.
#[test]
fn clear_is_structural_only_with_entries() {
    let mut m: HashMap<u8, u8> = HashMap::new();
    let mut c = m.cursor();
    m.clear();
    assert_eq!(c.next(&m), Ok(None));

    m.insert(1, 1);
    let mut c = m.cursor();
    m.clear();
    assert_eq!(c.next(&m), Err(Error::ConcurrentModification));
}

// Test: presizing.
// Verifies: with_capacity and with_config round to powers of two, and
// growth past the threshold keeps every key reachable.
#[test]
fn capacity_and_growth() {
    let m: HashMap<u32, u32> = HashMap::with_capacity(10);
    assert_eq!(m.capacity(), 16);

    let mut m: HashMap<u32, u32> =
        HashMap::with_config(MapConfig::new().initial_capacity(3).load_factor(1.0)).unwrap();
    assert_eq!(m.capacity(), 4);
    for i in 0..4 {
        m.insert(i, i);
    }
    assert_eq!(m.capacity(), 4, "load factor 1.0 fills every bucket");
    m.insert(4, 4);
    assert_eq!(m.capacity(), 8);
    assert!((0..5).all(|i| m.get(&i) == Some(&i)));
}

// Test: key-set view.
// Verifies: UnsupportedOperation on insert, removal writes through.
#[test]
fn key_set_view() {
    let mut m: HashMap<&str, i32> = HashMap::new();
    m.insert("x", 1);
    m.insert("y", 2);
    let mut ks = m.key_set();
    assert!(matches!(ks.insert("z"), Err(Error::UnsupportedOperation(_))));
    assert_eq!(ks.len(), 2);
    assert!(ks.remove("x"));
    assert_eq!(ks.iter().count(), 1);
    assert!(!m.contains_key("x"));
    assert!(!m.contains_key("z"));
}

// Test: HashSet with a null element.
// Verifies: set algebra and cursor removal through the public API.
#[test]
fn hash_set_basics() {
    let mut s: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
    s.insert_null();
    assert_eq!(s.len(), 4);
    assert!(s.contains("b") && s.contains_null());

    let mut other = s.clone();
    other.retain(|v| v != Some(&"a"));
    assert!(other.is_subset(&s));
    assert!(!s.is_subset(&other));

    let mut c = s.cursor();
    while let Some(v) = c.next(&s).unwrap() {
        if v.is_none() {
            assert_eq!(c.remove(&mut s).unwrap(), None);
        }
    }
    assert!(!s.contains_null());
    let mut rest: Vec<_> = s.into_iter().map(Option::unwrap).collect();
    rest.sort();
    assert_eq!(rest, ["a", "b", "c"]);
}

// Test: Debug formatting.
// Verifies: maps print like std maps, the null key as None.
#[test]
fn debug_output() {
    let mut m: HashMap<i32, &str> = HashMap::new();
    m.insert_null("n");
    assert_eq!(format!("{m:?}"), r#"{None: "n"}"#);
}
