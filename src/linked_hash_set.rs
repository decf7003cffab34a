//! LinkedHashSet: an insertion-ordered set backed by
//! `LinkedHashMap<T, ()>`.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

use crate::config::MapConfig;
use crate::error::Result;
use crate::linked_hash_map::{LinkedCursor, LinkedHashMap, Order};

/// A hash set that iterates in the order elements were first added.
/// Re-adding an element does not move it.
pub struct LinkedHashSet<T, S = RandomState> {
    map: LinkedHashMap<T, (), S>,
}

impl<T> LinkedHashSet<T, RandomState> {
    pub fn new() -> Self {
        Self {
            map: LinkedHashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: LinkedHashMap::with_capacity(capacity),
        }
    }

    pub fn with_config(config: MapConfig) -> Result<Self> {
        Ok(Self {
            map: LinkedHashMap::with_config(config, Order::Insertion)?,
        })
    }
}

impl<T> Default for LinkedHashSet<T, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> LinkedHashSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: LinkedHashMap::with_hasher(hasher, Order::Insertion),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Elements in insertion order; the null element is `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.map.keys()
    }

    /// First element still present, if any.
    pub fn first(&self) -> Option<Option<&T>> {
        self.map.eldest().map(|(k, _)| k)
    }

    pub fn cursor(&self) -> LinkedSetCursor {
        LinkedSetCursor {
            inner: self.map.cursor(),
        }
    }

    pub fn contains_null(&self) -> bool {
        self.map.contains_null_key()
    }

    pub fn insert_null(&mut self) -> bool {
        self.map.insert_null(()).is_none()
    }

    pub fn remove_null(&mut self) -> bool {
        self.map.remove_null().is_some()
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Option<&T>) -> bool,
    {
        self.map.retain(|k, _| keep(k));
    }
}

impl<T, S> LinkedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn insert(&mut self, value: T) -> bool {
        self.map.insert(value, ()).is_none()
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(value)
    }

    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove(value).is_some()
    }
}

impl<T, S> Clone for LinkedHashSet<T, S>
where
    T: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T: fmt::Debug, S> fmt::Debug for LinkedHashSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> PartialEq for LinkedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T, S> Extend<T> for LinkedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.map.extend(iter.into_iter().map(|v| (v, ())));
    }
}

impl<T> FromIterator<T> for LinkedHashSet<T, RandomState>
where
    T: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Fail-fast cursor over a [`LinkedHashSet`], in insertion order.
#[derive(Clone, Copy, Debug)]
pub struct LinkedSetCursor {
    inner: LinkedCursor,
}

impl LinkedSetCursor {
    pub fn next<'s, T, S>(
        &mut self,
        set: &'s LinkedHashSet<T, S>,
    ) -> Result<Option<Option<&'s T>>> {
        Ok(self.inner.next(&set.map)?.map(|(k, _)| k))
    }

    pub fn remove<T, S>(&mut self, set: &mut LinkedHashSet<T, S>) -> Result<Option<T>> {
        self.inner.remove(&mut set.map).map(|(k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_insertion_position() {
        let mut s = LinkedHashSet::new();
        for v in ["b", "a", "c", "a", "b"] {
            s.insert(v);
        }
        let got: Vec<_> = s.iter().map(|v| *v.unwrap()).collect();
        assert_eq!(got, ["b", "a", "c"]);
        assert_eq!(s.first(), Some(Some(&"b")));
    }

    #[test]
    fn remove_then_reinsert_moves_to_end() {
        let mut s: LinkedHashSet<i32> = (0..4).collect();
        assert!(s.remove(&1));
        assert!(s.insert(1));
        let got: Vec<_> = s.iter().map(|v| *v.unwrap()).collect();
        assert_eq!(got, [0, 2, 3, 1]);
    }

    #[test]
    fn cursor_walks_in_order_and_removes() {
        let mut s: LinkedHashSet<i32> = (0..6).collect();
        s.insert_null();
        let mut c = s.cursor();
        let mut seen = Vec::new();
        while let Some(v) = c.next(&s).unwrap() {
            seen.push(v.copied());
            if v.is_none() {
                c.remove(&mut s).unwrap();
            }
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last(), Some(&None));
        assert!(!s.contains_null());
        assert_eq!(s.len(), 6);
    }
}
