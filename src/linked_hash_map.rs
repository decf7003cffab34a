//! LinkedHashMap: a [`BucketStore`] whose entries are additionally
//! threaded onto a circular doubly-linked list.
//!
//! The list is kept as arena indices in each entry's payload plus a
//! sentinel header owned by the map, never as ownership. With no
//! entries the header points at itself in both directions; otherwise
//! `header.after` is the eldest entry and `header.before` the newest (or
//! most recently accessed, in access order).
//!
//! Rehashing only re-chains buckets, so iteration order survives resizes
//! untouched.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::mem;

use log::trace;

use crate::bucket_store::{BucketStore, Entry, EntryId};
use crate::config::MapConfig;
use crate::error::{Error, Result};

/// Position in the circular list: the sentinel header or a real entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Header,
    Entry(EntryId),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Links {
    before: Link,
    after: Link,
}

impl Links {
    const fn empty() -> Self {
        Self {
            before: Link::Header,
            after: Link::Header,
        }
    }
}

/// Iteration order of a [`LinkedHashMap`], fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Entries keep the position of their first insertion.
    #[default]
    Insertion,
    /// Every successful lookup or update moves the entry to the end.
    Access,
}

/// Decides, after each insertion of a new mapping, whether the eldest
/// mapping should be evicted.
pub trait EvictionPolicy<K, V> {
    /// `len` includes the entry just inserted. `key` is `None` when the
    /// eldest mapping is the null key.
    fn remove_eldest(&mut self, len: usize, key: Option<&K>, value: &V) -> bool;
}

/// Never evicts anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverEvict;

impl<K, V> EvictionPolicy<K, V> for NeverEvict {
    #[inline]
    fn remove_eldest(&mut self, _len: usize, _key: Option<&K>, _value: &V) -> bool {
        false
    }
}

/// Bounds the map to at most `n` mappings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxEntries(pub usize);

impl<K, V> EvictionPolicy<K, V> for MaxEntries {
    #[inline]
    fn remove_eldest(&mut self, len: usize, _key: Option<&K>, _value: &V) -> bool {
        len > self.0
    }
}

impl<K, V, F> EvictionPolicy<K, V> for F
where
    F: FnMut(usize, Option<&K>, &V) -> bool,
{
    #[inline]
    fn remove_eldest(&mut self, len: usize, key: Option<&K>, value: &V) -> bool {
        self(len, key, value)
    }
}

/// A hash map with predictable iteration order.
///
/// In [`Order::Insertion`] mode iteration yields mappings in the order
/// their keys were first inserted; replacing a value does not move it.
/// In [`Order::Access`] mode `get`, `get_mut` and `insert` on an
/// existing key move that mapping to the end, which makes the map a
/// natural LRU cache when paired with [`MaxEntries`]. Use
/// [`peek`](Self::peek) to read without touching.
pub struct LinkedHashMap<K, V, S = RandomState, P = NeverEvict> {
    store: BucketStore<K, V, Links, S>,
    header: Links,
    order: Order,
    policy: P,
}

impl<K, V> LinkedHashMap<K, V, RandomState, NeverEvict> {
    pub fn new() -> Self {
        Self::with_order(Order::Insertion)
    }

    pub fn with_order(order: Order) -> Self {
        Self::with_hasher(RandomState::new(), order)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut map = Self::new();
        map.store.ensure_capacity(capacity);
        map
    }

    pub fn with_config(config: MapConfig, order: Order) -> Result<Self> {
        Self::with_config_and_hasher(config, order, RandomState::new())
    }
}

impl<K, V> Default for LinkedHashMap<K, V, RandomState, NeverEvict> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> LinkedHashMap<K, V, S, NeverEvict> {
    pub fn with_hasher(hasher: S, order: Order) -> Self {
        Self {
            store: BucketStore::with_hasher(hasher),
            header: Links::empty(),
            order,
            policy: NeverEvict,
        }
    }

    pub fn with_config_and_hasher(config: MapConfig, order: Order, hasher: S) -> Result<Self> {
        Ok(Self {
            store: BucketStore::with_config(&config, hasher)?,
            header: Links::empty(),
            order,
            policy: NeverEvict,
        })
    }
}

impl<K, V, S, P> LinkedHashMap<K, V, S, P> {
    /// Replace the eviction policy, keeping every current mapping.
    pub fn with_eviction<P2>(self, policy: P2) -> LinkedHashMap<K, V, S, P2>
    where
        P2: EvictionPolicy<K, V>,
    {
        LinkedHashMap {
            store: self.store,
            header: self.header,
            order: self.order,
            policy,
        }
    }

    pub fn order(&self) -> Order {
        self.order
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
        self.header = Links::empty();
    }

    /// Mappings from eldest to newest; the null key is `None`.
    pub fn iter(&self) -> Iter<'_, K, V, S, P> {
        Iter {
            map: self,
            next: self.header.after,
            remaining: self.store.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Option<&K>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Mutable access to every value, in unspecified order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.store.iter_mut().map(|(_, e)| &mut e.value)
    }

    pub fn cursor(&self) -> LinkedCursor {
        LinkedCursor {
            expected: self.store.mods().count(),
            next: self.header.after,
            last: None,
        }
    }

    /// The mapping the eviction policy would remove next.
    pub fn eldest(&self) -> Option<(Option<&K>, &V)> {
        let Link::Entry(id) = self.header.after else {
            return None;
        };
        self.store.entry(id).map(|e| (e.key.as_ref(), &e.value))
    }

    pub fn contains_null_key(&self) -> bool {
        self.store.null_entry().is_some()
    }

    /// Value of the null key, moving it to the end in access order.
    pub fn get_null(&mut self) -> Option<&V> {
        let id = self.store.null_entry()?;
        self.touch(id);
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn peek_null(&self) -> Option<&V> {
        let id = self.store.null_entry()?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn remove_null(&mut self) -> Option<V> {
        let entry = self.store.remove_null()?;
        self.detach(entry.ext);
        Some(entry.value)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Keep only the mappings for which `keep` returns true, visiting
    /// them eldest first.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Option<&K>, &mut V) -> bool,
    {
        let mut cur = self.header.after;
        while let Link::Entry(id) = cur {
            let Some(e) = self.store.entry_mut(id) else {
                break;
            };
            cur = e.ext.after;
            if !keep(e.key.as_ref(), &mut e.value) {
                self.remove_by_id(id);
            }
        }
    }

    fn links_mut(&mut self, link: Link) -> Option<&mut Links> {
        match link {
            Link::Header => Some(&mut self.header),
            Link::Entry(id) => self.store.entry_mut(id).map(|e| &mut e.ext),
        }
    }

    /// Append a freshly stored entry after the current newest.
    fn attach_tail(&mut self, id: EntryId) {
        let tail = self.header.before;
        if let Some(links) = self.links_mut(Link::Entry(id)) {
            *links = Links {
                before: tail,
                after: Link::Header,
            };
        }
        if let Some(prev) = self.links_mut(tail) {
            prev.after = Link::Entry(id);
        }
        self.header.before = Link::Entry(id);
    }

    /// Close the gap left by an entry whose links were `links`.
    fn detach(&mut self, links: Links) {
        if let Some(prev) = self.links_mut(links.before) {
            prev.after = links.after;
        }
        if let Some(next) = self.links_mut(links.after) {
            next.before = links.before;
        }
    }

    /// Record an access: in access order the entry moves to the tail,
    /// which counts as a structural change.
    fn touch(&mut self, id: EntryId) {
        if self.order != Order::Access {
            return;
        }
        if self.header.before != Link::Entry(id) {
            let Some(links) = self.store.entry(id).map(|e| e.ext) else {
                return;
            };
            self.detach(links);
            self.attach_tail(id);
        }
        self.store.mods_mut().bump();
    }

    fn remove_by_id(&mut self, id: EntryId) -> Option<Entry<K, V, Links>> {
        let entry = self.store.remove_id(id)?;
        self.detach(entry.ext);
        Some(entry)
    }

    fn pop_eldest(&mut self) -> Option<Entry<K, V, Links>> {
        match self.header.after {
            Link::Header => None,
            Link::Entry(id) => self.remove_by_id(id),
        }
    }
}

impl<K, V, S, P> LinkedHashMap<K, V, S, P>
where
    P: EvictionPolicy<K, V>,
{
    /// Map the null key to `value`, returning the previous value.
    pub fn insert_null(&mut self, value: V) -> Option<V> {
        if let Some(id) = self.store.null_entry() {
            self.touch(id);
            return self
                .store
                .entry_mut(id)
                .map(|e| mem::replace(&mut e.value, value));
        }
        let id = self.store.insert_null(value, Links::empty());
        self.attach_tail(id);
        self.evict_if_needed();
        None
    }

    fn evict_if_needed(&mut self) {
        let Link::Entry(eldest) = self.header.after else {
            return;
        };
        let len = self.store.len();
        let evict = match self.store.entry(eldest) {
            Some(e) => self.policy.remove_eldest(len, e.key.as_ref(), &e.value),
            None => false,
        };
        if evict {
            self.remove_by_id(eldest);
            trace!("linked map evicted its eldest entry ({} left)", self.store.len());
        }
    }
}

impl<K, V, S, P> LinkedHashMap<K, V, S, P>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn find<Q>(&self, key: &Q) -> Option<EntryId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.store.hash_key(key);
        self.store.find(hash, |k| k.borrow() == key)
    }

    /// Look up `key`, moving the mapping to the end in access order.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        self.touch(id);
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        self.touch(id);
        self.store.entry_mut(id).map(|e| &mut e.value)
    }

    /// Look up `key` without affecting access order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        self.store.entry(id).map(|e| &e.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
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
        let (_, entry) = self.store.remove_where(hash, |k| k.borrow() == key)?;
        self.detach(entry.ext);
        let (k, v) = entry.into_parts();
        k.map(|k| (k, v))
    }
}

impl<K, V, S, P> LinkedHashMap<K, V, S, P>
where
    K: Eq + Hash,
    S: BuildHasher,
    P: EvictionPolicy<K, V>,
{
    /// Map `key` to `value`, returning the value it replaced.
    ///
    /// A new key is appended at the end and may trigger eviction of the
    /// eldest mapping. An existing key keeps its position in insertion
    /// order and moves to the end in access order.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.store.hash_key(&key);
        if let Some(id) = self.store.find(hash, |k| *k == key) {
            self.touch(id);
            return self
                .store
                .entry_mut(id)
                .map(|e| mem::replace(&mut e.value, value));
        }
        let id = self.store.insert_new(key, hash, value, Links::empty());
        self.attach_tail(id);
        self.evict_if_needed();
        None
    }
}

impl<K, V, S, P> Clone for LinkedHashMap<K, V, S, P>
where
    K: Clone,
    V: Clone,
    S: Clone,
    P: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            header: self.header,
            order: self.order,
            policy: self.policy.clone(),
        }
    }
}

impl<K, V, S, P> fmt::Debug for LinkedHashMap<K, V, S, P>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Content equality; iteration order is not compared.
impl<K, V, S, P> PartialEq for LinkedHashMap<K, V, S, P>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| match k {
                None => other.peek_null() == Some(v),
                Some(k) => other.peek(k) == Some(v),
            })
    }
}

impl<K, V, S, P> Extend<(K, V)> for LinkedHashMap<K, V, S, P>
where
    K: Eq + Hash,
    S: BuildHasher,
    P: EvictionPolicy<K, V>,
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

impl<K, V> FromIterator<(K, V)> for LinkedHashMap<K, V, RandomState, NeverEvict>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, P> IntoIterator for &'a LinkedHashMap<K, V, S, P> {
    type Item = (Option<&'a K>, &'a V);
    type IntoIter = Iter<'a, K, V, S, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S, P> IntoIterator for LinkedHashMap<K, V, S, P> {
    type Item = (Option<K>, V);
    type IntoIter = IntoIter<K, V, S, P>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { map: self }
    }
}

/// Borrowing iterator from eldest to newest.
pub struct Iter<'a, K, V, S, P> {
    map: &'a LinkedHashMap<K, V, S, P>,
    next: Link,
    remaining: usize,
}

impl<'a, K, V, S, P> Iterator for Iter<'a, K, V, S, P> {
    type Item = (Option<&'a K>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let Link::Entry(id) = self.next else {
            return None;
        };
        let e = self.map.store.entry(id)?;
        self.next = e.ext.after;
        self.remaining = self.remaining.saturating_sub(1);
        Some((e.key.as_ref(), &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S, P> ExactSizeIterator for Iter<'_, K, V, S, P> {}

/// Owning iterator from eldest to newest.
pub struct IntoIter<K, V, S, P> {
    map: LinkedHashMap<K, V, S, P>,
}

impl<K, V, S, P> Iterator for IntoIter<K, V, S, P> {
    type Item = (Option<K>, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.map.pop_eldest().map(|e| e.into_parts())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.map.len(), Some(self.map.len()))
    }
}

/// Fail-fast cursor over a [`LinkedHashMap`], eldest first.
///
/// Access-order touches are structural, so calling `get` on an
/// access-ordered map invalidates its cursors.
#[derive(Clone, Copy, Debug)]
pub struct LinkedCursor {
    expected: u64,
    next: Link,
    last: Option<EntryId>,
}

impl LinkedCursor {
    pub fn next<'m, K, V, S, P>(
        &mut self,
        map: &'m LinkedHashMap<K, V, S, P>,
    ) -> Result<Option<(Option<&'m K>, &'m V)>> {
        map.store.mods().check(self.expected)?;
        let Link::Entry(id) = self.next else {
            self.last = None;
            return Ok(None);
        };
        let Some(e) = map.store.entry(id) else {
            return Err(Error::ConcurrentModification);
        };
        self.next = e.ext.after;
        self.last = Some(id);
        Ok(Some((e.key.as_ref(), &e.value)))
    }

    /// Remove the mapping most recently returned by [`next`](Self::next).
    pub fn remove<K, V, S, P>(
        &mut self,
        map: &mut LinkedHashMap<K, V, S, P>,
    ) -> Result<(Option<K>, V)> {
        let id = self
            .last
            .take()
            .ok_or(Error::IllegalState("remove() without a preceding next()"))?;
        map.store.mods().check(self.expected)?;
        let entry = map
            .remove_by_id(id)
            .ok_or(Error::ConcurrentModification)?;
        self.expected = map.store.mods().count();
        Ok(entry.into_parts())
    }
}

#[cfg(test)]
impl<K, V, S, P> LinkedHashMap<K, V, S, P> {
    /// Walk the list both ways and check it against `len()`.
    pub(crate) fn assert_links_consistent(&self) {
        let mut forward = 0;
        let mut prev = Link::Header;
        let mut cur = self.header.after;
        while let Link::Entry(id) = cur {
            let e = self.store.entry(id).expect("linked entry missing from store");
            assert_eq!(e.ext.before, prev, "broken before link");
            prev = cur;
            cur = e.ext.after;
            forward += 1;
            assert!(forward <= self.len(), "cycle without header");
        }
        assert_eq!(self.header.before, prev, "header.before is not the tail");
        assert_eq!(forward, self.len());
    }
}
