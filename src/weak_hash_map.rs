//! WeakHashMap: a chained hash map whose keys are held weakly.
//!
//! Entries store a [`WeakKeyRef`] and are registered with their key's
//! referent. Once the last [`KeyRef`] for a key is dropped the entry's
//! index lands on this map's reclamation queue; every public operation
//! that reads, writes, reports size or starts an iteration drains that
//! queue first. Because arena keys are generational, a notification for
//! an entry that was already removed resolves to nothing and is dropped.
//!
//! The null key is a permanent strong slot and is never reclaimed.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::mem;

use log::trace;

use crate::bucket_store::{self, BucketStore, ChainCursor};
use crate::config::MapConfig;
use crate::error::Result;
use crate::weak_key::{KeyRef, ReclaimQueue, WeakKeyRef};

/// A hash map that does not keep its keys alive.
///
/// Methods that must observe reclamation take `&mut self`, including
/// [`len`](Self::len) and [`get`](Self::get). The map is neither `Send`
/// nor `Sync`.
pub struct WeakHashMap<K, V, S = RandomState> {
    store: BucketStore<WeakKeyRef<K>, V, (), S>,
    queue: ReclaimQueue,
}

impl<K, V> WeakHashMap<K, V, RandomState> {
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

impl<K, V> Default for WeakHashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> WeakHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            store: BucketStore::with_hasher(hasher),
            queue: ReclaimQueue::new(),
        }
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self> {
        Ok(Self {
            store: BucketStore::with_config(&config, hasher)?,
            queue: ReclaimQueue::new(),
        })
    }

    /// Unlink every entry whose key has died since the last drain.
    /// Returns the number of entries removed.
    pub fn poll(&mut self) -> usize {
        let mut reclaimed = 0;
        while let Some(id) = self.queue.pop() {
            // Dropping the value may queue further ids; the queue is not
            // borrowed here.
            if self.store.remove_id(id).is_some() {
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            trace!(
                "weak map reclaimed {} entries ({} left)",
                reclaimed,
                self.store.len()
            );
        }
        reclaimed
    }

    /// Number of live mappings.
    pub fn len(&mut self) -> usize {
        self.poll();
        self.store.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Size without draining the queue. May count entries whose keys
    /// are already dead.
    pub fn len_hint(&self) -> usize {
        self.store.len()
    }

    /// Number of buckets currently allocated.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn clear(&mut self) {
        self.poll();
        self.unregister_live_keys();
        self.store.clear();
    }

    /// Withdraw this map's registrations from every key still alive.
    fn unregister_live_keys(&self) {
        for (id, e) in self.store.iter() {
            if let Some(k) = e.key.as_ref().and_then(WeakKeyRef::upgrade) {
                k.unregister(&self.queue, id);
            }
        }
    }

    /// Live mappings in unspecified order. Keys come back as strong
    /// handles; entries whose key dies mid-iteration are skipped.
    pub fn iter(&mut self) -> Iter<'_, K, V, S> {
        self.poll();
        Iter {
            inner: self.store.iter(),
        }
    }

    pub fn keys(&mut self) -> impl Iterator<Item = Option<KeyRef<K>>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&mut self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Start a fail-fast cursor. Reclamation is structural, so any
    /// polling call made while the cursor is live may invalidate it.
    pub fn cursor(&mut self) -> WeakCursor {
        self.poll();
        WeakCursor {
            inner: ChainCursor::new(&self.store),
        }
    }

    pub fn contains_null_key(&mut self) -> bool {
        self.poll();
        self.store.null_entry().is_some()
    }

    pub fn get_null(&mut self) -> Option<&V> {
        self.poll();
        let id = self.store.null_entry()?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn insert_null(&mut self, value: V) -> Option<V> {
        self.poll();
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
        self.poll();
        self.store.remove_null().map(|e| e.value)
    }

    pub fn contains_value(&mut self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Keep only the live mappings for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Option<&K>, &mut V) -> bool,
    {
        self.poll();
        let removed = self.store.retain(|e| match &e.key {
            None => keep(None, &mut e.value),
            Some(wk) => match wk.upgrade() {
                Some(k) => keep(Some(&*k), &mut e.value),
                None => true,
            },
        });
        for (id, entry) in removed {
            if let Some(k) = entry.key.as_ref().and_then(WeakKeyRef::upgrade) {
                k.unregister(&self.queue, id);
            }
        }
    }
}

impl<K, V, S> WeakHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn find<Q>(&self, key: &Q) -> Option<bucket_store::EntryId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        self.store.find(hash, |wk| {
            wk.with_key(|k| k.borrow() == key).unwrap_or(false)
        })
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.poll();
        let id = self.find(key)?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.poll();
        let id = self.find(key)?;
        self.store.entry_mut(id).map(|e| &mut e.value)
    }

    pub fn contains_key<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.poll();
        self.find(key).is_some()
    }

    /// Map `key` to `value` without keeping `key` alive.
    ///
    /// If a live equal key is already present its value is replaced and
    /// the original key handle is kept. Passing the only strong handle
    /// makes the mapping collectable as soon as this call returns.
    pub fn insert(&mut self, key: KeyRef<K>, value: V) -> Option<V> {
        self.poll();
        let hash = self.store.hash_key(&*key);
        let probe: &K = &key;
        if let Some(e) = self
            .store
            .find_mut(hash, |wk| wk.with_key(|k| k == probe).unwrap_or(false))
        {
            return Some(mem::replace(&mut e.value, value));
        }
        let id = self
            .store
            .insert_new(KeyRef::downgrade(&key), hash, value, ());
        key.register(&self.queue, id);
        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.poll();
        let hash = self.store.hash_key(key);
        let (id, entry) = self.store.remove_where(hash, |wk| {
            wk.with_key(|k| k.borrow() == key).unwrap_or(false)
        })?;
        if let Some(k) = entry.key.as_ref().and_then(WeakKeyRef::upgrade) {
            k.unregister(&self.queue, id);
        }
        Some(entry.value)
    }
}

impl<K, V, S> Drop for WeakHashMap<K, V, S> {
    fn drop(&mut self) {
        self.unregister_live_keys();
    }
}

impl<K, V, S> Extend<(KeyRef<K>, V)> for WeakHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (KeyRef<K>, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.store.ensure_capacity(self.store.len() + lower);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> fmt::Debug for WeakHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = Iter {
            inner: self.store.iter(),
        };
        f.debug_map().entries(live).finish()
    }
}

/// Borrowing iterator over live mappings.
pub struct Iter<'a, K, V, S> {
    inner: bucket_store::Iter<'a, WeakKeyRef<K>, V, (), S>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (Option<KeyRef<K>>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (_, e) = self.inner.next()?;
            match &e.key {
                None => return Some((None, &e.value)),
                Some(wk) => {
                    if let Some(k) = wk.upgrade() {
                        return Some((Some(k), &e.value));
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Fail-fast cursor over a [`WeakHashMap`].
///
/// Each reported key is re-acquired as a strong [`KeyRef`]; entries
/// whose key died after the cursor started are skipped.
#[derive(Clone, Copy, Debug)]
pub struct WeakCursor {
    inner: ChainCursor,
}

impl WeakCursor {
    pub fn next<'m, K, V, S>(
        &mut self,
        map: &'m WeakHashMap<K, V, S>,
    ) -> Result<Option<(Option<KeyRef<K>>, &'m V)>> {
        while let Some(id) = self.inner.step(&map.store)? {
            let Some(e) = map.store.entry(id) else {
                continue;
            };
            match &e.key {
                None => return Ok(Some((None, &e.value))),
                Some(wk) => {
                    if let Some(k) = wk.upgrade() {
                        return Ok(Some((Some(k), &e.value)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Remove the mapping most recently returned by [`next`](Self::next).
    pub fn remove<K, V, S>(&mut self, map: &mut WeakHashMap<K, V, S>) -> Result<V> {
        let (id, entry) = self.inner.remove_last(&mut map.store)?;
        if let Some(k) = entry.key.as_ref().and_then(WeakKeyRef::upgrade) {
            k.unregister(&map.queue, id);
        }
        Ok(entry.value)
    }
}
