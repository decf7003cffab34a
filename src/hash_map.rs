//! HashMap: chained hash map with a reserved null-key slot and
//! fail-fast cursors.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::mem;

use crate::bucket_store::{self, BucketStore, ChainCursor, Entry, EntryId};
use crate::config::MapConfig;
use crate::error::{Error, Result};

/// A hash map using separate chaining.
///
/// Besides ordinary keys, the map can hold one mapping for the *null
/// key* (see [`insert_null`](Self::insert_null)); iteration reports it
/// with key `None`. Iteration order is otherwise unspecified.
///
/// Borrowing iterators (`iter`, `keys`, `values`) are statically
/// protected from concurrent mutation. [`Cursor`] does not borrow the
/// map between steps and instead fails fast with
/// [`Error::ConcurrentModification`] if the map is structurally changed
/// behind its back.
pub struct HashMap<K, V, S = RandomState> {
    pub(crate) store: BucketStore<K, V, (), S>,
}

impl<K, V> HashMap<K, V, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut map = Self::new();
        map.store.ensure_capacity(capacity);
        map
    }

    pub fn with_config(config: MapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V> Default for HashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            store: BucketStore::with_hasher(hasher),
        }
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self> {
        Ok(Self {
            store: BucketStore::with_config(&config, hasher)?,
        })
    }

    pub fn hasher(&self) -> &S {
        self.store.hasher()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Number of buckets currently allocated.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            inner: self.store.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Option<&K>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Mutable access to every value. Visits the same entries as
    /// [`iter`](Self::iter), though not necessarily in the same order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.store.iter_mut().map(|(_, e)| &mut e.value)
    }

    /// Start a fail-fast cursor at the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            inner: ChainCursor::new(&self.store),
        }
    }

    pub fn contains_null_key(&self) -> bool {
        self.store.null_entry().is_some()
    }

    pub fn get_null(&self) -> Option<&V> {
        let id = self.store.null_entry()?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn get_null_mut(&mut self) -> Option<&mut V> {
        let id = self.store.null_entry()?;
        self.store.entry_mut(id).map(|e| &mut e.value)
    }

    /// Map the null key to `value`, returning the previous value.
    pub fn insert_null(&mut self, value: V) -> Option<V> {
        if let Some(e) = self
            .store
            .null_entry()
            .and_then(|id| self.store.entry_mut(id))
        {
            return Some(mem::replace(&mut e.value, value));
        }
        self.store.insert_null(value, ());
        None
    }

    pub fn remove_null(&mut self) -> Option<V> {
        self.store.remove_null().map(|e| e.value)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Keep only the mappings for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Option<&K>, &mut V) -> bool,
    {
        self.store.retain(|e| keep(e.key.as_ref(), &mut e.value));
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        let id = self.store.find(hash, |k| k.borrow() == key)?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        self.store
            .find_mut(hash, |k| k.borrow() == key)
            .map(|e| &mut e.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        self.store.find(hash, |k| k.borrow() == key).is_some()
    }

    /// Map `key` to `value`, returning the value it replaced. Replacing
    /// a value keeps the originally inserted key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.store.hash_key(&key);
        if let Some(e) = self.store.find_mut(hash, |k| *k == key) {
            return Some(mem::replace(&mut e.value, value));
        }
        self.store.insert_new(key, hash, value, ());
        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        let (_, e) = self.store.remove_where(hash, |k| k.borrow() == key)?;
        let (k, v) = e.into_parts();
        k.map(|k| (k, v))
    }

    /// Key-set view. Supports lookup and removal, not insertion.
    pub fn key_set(&mut self) -> KeySet<'_, K, V, S> {
        KeySet { map: self }
    }
}

impl<K, V, S> Clone for HashMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| match k {
                None => other.get_null() == Some(v),
                Some(k) => other.get(k) == Some(v),
            })
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.store.ensure_capacity(self.len() + lower);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HashMap<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S> {
    type Item = (Option<&'a K>, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> IntoIterator for HashMap<K, V, S> {
    type Item = (Option<K>, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.store.into_entries(),
        }
    }
}

/// Borrowing iterator over `(key, value)`; the null key is `None`.
pub struct Iter<'a, K, V, S> {
    inner: bucket_store::Iter<'a, K, V, (), S>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (Option<&'a K>, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| (e.key.as_ref(), &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, S> ExactSizeIterator for Iter<'_, K, V, S> {}

/// Owning iterator produced by `HashMap::into_iter`.
pub struct IntoIter<K, V> {
    inner: slotmap::basic::IntoIter<EntryId, Entry<K, V, ()>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (Option<K>, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e.into_parts())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Fail-fast cursor over a [`HashMap`].
///
/// The cursor remembers the map's modification count when created and
/// checks it on every step. Removing through the cursor resynchronizes
/// it; any other structural change makes the next call fail with
/// [`Error::ConcurrentModification`]. A cursor must only be used with
/// the map that created it.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    inner: ChainCursor,
}

impl Cursor {
    /// Report the next mapping, or `None` once the map is exhausted.
    pub fn next<'m, K, V, S>(
        &mut self,
        map: &'m HashMap<K, V, S>,
    ) -> Result<Option<(Option<&'m K>, &'m V)>> {
        let Some(id) = self.inner.step(&map.store)? else {
            return Ok(None);
        };
        Ok(map.store.entry(id).map(|e| (e.key.as_ref(), &e.value)))
    }

    /// Remove the mapping most recently returned by [`next`](Self::next).
    pub fn remove<K, V, S>(&mut self, map: &mut HashMap<K, V, S>) -> Result<(Option<K>, V)> {
        self.inner
            .remove_last(&mut map.store)
            .map(|(_, e)| e.into_parts())
    }
}

/// Mutable key-set view over a [`HashMap`].
pub struct KeySet<'a, K, V, S> {
    map: &'a mut HashMap<K, V, S>,
}

impl<K, V, S> KeySet<'_, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(key)
    }

    /// Remove `key` and its value from the backing map.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&K>> + '_ {
        self.map.keys()
    }

    /// Key sets cannot invent values; always rejected without effect.
    pub fn insert(&mut self, _key: K) -> Result<bool> {
        Err(Error::UnsupportedOperation("insert into a key-set view"))
    }
}
