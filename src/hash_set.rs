//! HashSet: a set backed by `HashMap<T, ()>`.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

use crate::config::MapConfig;
use crate::error::Result;
use crate::hash_map::{self, HashMap};

/// A hash set with the same chaining, null-element and fail-fast
/// behavior as [`HashMap`], which it wraps.
pub struct HashSet<T, S = RandomState> {
    map: HashMap<T, (), S>,
}

impl<T> HashSet<T, RandomState> {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn with_config(config: MapConfig) -> Result<Self> {
        Ok(Self {
            map: HashMap::with_config(config)?,
        })
    }
}

impl<T> Default for HashSet<T, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> HashSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: HashMap::with_hasher(hasher),
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

    /// Elements in unspecified order; the null element is `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.map.keys()
    }

    pub fn cursor(&self) -> SetCursor {
        SetCursor {
            inner: self.map.cursor(),
        }
    }

    pub fn contains_null(&self) -> bool {
        self.map.contains_null_key()
    }

    /// Add the null element; returns false if it was already present.
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

impl<T, S> HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    /// Add `value`; returns false if an equal element was present, in
    /// which case the stored element is kept.
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

    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove_entry(value).map(|(k, _)| k)
    }

    pub fn is_subset<S2>(&self, other: &HashSet<T, S2>) -> bool
    where
        S2: BuildHasher,
    {
        self.len() <= other.len()
            && self.iter().all(|v| match v {
                None => other.contains_null(),
                Some(v) => other.contains(v),
            })
    }
}

impl<T, S> Clone for HashSet<T, S>
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

impl<T: fmt::Debug, S> fmt::Debug for HashSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> PartialEq for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

impl<T, S> Eq for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
}

impl<T, S> Extend<T> for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.map.extend(iter.into_iter().map(|v| (v, ())));
    }
}

impl<T> FromIterator<T> for HashSet<T, RandomState>
where
    T: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

fn element<T>((key, ()): (Option<T>, ())) -> Option<T> {
    key
}

impl<T, S> IntoIterator for HashSet<T, S> {
    type Item = Option<T>;
    type IntoIter = core::iter::Map<hash_map::IntoIter<T, ()>, fn((Option<T>, ())) -> Option<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map
            .into_iter()
            .map(element::<T> as fn((Option<T>, ())) -> Option<T>)
    }
}

/// Fail-fast cursor over a [`HashSet`].
#[derive(Clone, Copy, Debug)]
pub struct SetCursor {
    inner: hash_map::Cursor,
}

impl SetCursor {
    /// `Ok(Some(None))` reports the null element.
    pub fn next<'s, T, S>(
        &mut self,
        set: &'s HashSet<T, S>,
    ) -> Result<Option<Option<&'s T>>> {
        Ok(self.inner.next(&set.map)?.map(|(k, _)| k))
    }

    pub fn remove<T, S>(&mut self, set: &mut HashSet<T, S>) -> Result<Option<T>> {
        self.inner.remove(&mut set.map).map(|(k, _)| k)
    }
}
