//! BucketStore: the chained hash table shared by every map in the crate.
//!
//! Entries live in a generational arena (`SlotMap`) and are threaded
//! into per-bucket singly-linked chains by arena index. Higher layers
//! attach their own per-entry payload through the `X` parameter (the
//! linked overlay stores its `before`/`after` links there) and drive
//! lookups with caller-supplied equality closures, so the store never
//! needs to know how a key is held (strongly, weakly, or not at all for
//! the null key).
//!
//! Invariants
//! - `table.len()` is zero or a power of two in
//!   `MINIMUM_CAPACITY..=MAXIMUM_CAPACITY`.
//! - Every non-null entry is reachable from exactly one chain head, at
//!   index `hash & (table.len() - 1)`.
//! - The null key occupies the reserved `null_entry` slot and is never
//!   placed in a chain.
//! - `len()` counts chain entries plus the null slot.

use core::hash::{BuildHasher, Hash};
use std::mem;

use log::debug;
use slotmap::SlotMap;

use crate::config::{MapConfig, DEFAULT_LOAD_FACTOR};
use crate::error::{Error, Result};
use crate::mod_tracker::ModTracker;

slotmap::new_key_type! {
    /// Arena index of a single map entry.
    pub(crate) struct EntryId;
}

pub(crate) const MINIMUM_CAPACITY: usize = 4;
pub(crate) const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Secondary hash applied on top of the user's hasher. Spreads bits so
/// that hashers with weak low bits still fill the table evenly
/// (single-word Wang/Jenkins variant).
#[inline]
pub(crate) fn spread(mut h: u32) -> u32 {
    h = h.wrapping_add((h << 15) ^ 0xffff_cd7d);
    h ^= h >> 10;
    h = h.wrapping_add(h << 3);
    h ^= h >> 6;
    h = h.wrapping_add((h << 2).wrapping_add(h << 14));
    h ^ (h >> 16)
}

#[inline]
fn fold(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

/// Bucket count for a requested capacity: zero stays zero (lazy table),
/// everything else is clamped and rounded up to a power of two.
pub(crate) fn table_capacity(requested: usize) -> usize {
    if requested == 0 {
        0
    } else if requested < MINIMUM_CAPACITY {
        MINIMUM_CAPACITY
    } else if requested > MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        requested.next_power_of_two()
    }
}

/// Capacity that holds `size` mappings with room to grow (3/2 size).
pub(crate) fn capacity_for_init_size(size: usize) -> usize {
    size.saturating_add(size >> 1).min(MAXIMUM_CAPACITY)
}

fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    (capacity as f64 * load_factor as f64) as usize
}

#[derive(Clone, Debug)]
pub(crate) struct Entry<K, V, X> {
    /// `None` only for the reserved null-key slot.
    pub(crate) key: Option<K>,
    pub(crate) value: V,
    pub(crate) hash: u32,
    next: Option<EntryId>,
    pub(crate) ext: X,
}

impl<K, V, X> Entry<K, V, X> {
    pub(crate) fn into_parts(self) -> (Option<K>, V) {
        (self.key, self.value)
    }
}

#[derive(Clone)]
pub(crate) struct BucketStore<K, V, X, S> {
    hasher: S,
    table: Vec<Option<EntryId>>,
    slots: SlotMap<EntryId, Entry<K, V, X>>,
    null_entry: Option<EntryId>,
    threshold: usize,
    load_factor: f32,
    mods: ModTracker,
}

impl<K, V, X, S> BucketStore<K, V, X, S> {
    pub(crate) fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            table: Vec::new(),
            slots: SlotMap::with_key(),
            null_entry: None,
            threshold: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
            mods: ModTracker::new(),
        }
    }

    pub(crate) fn with_config(config: &MapConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        let mut store = Self::with_hasher(hasher);
        store.load_factor = config.load_factor;
        let capacity = table_capacity(config.initial_capacity);
        if capacity > 0 {
            store.table = vec![None; capacity];
            store.threshold = threshold_for(capacity, store.load_factor);
        }
        Ok(store)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Current bucket count.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub(crate) fn mods(&self) -> &ModTracker {
        &self.mods
    }

    #[inline]
    pub(crate) fn mods_mut(&mut self) -> &mut ModTracker {
        &mut self.mods
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    #[inline]
    fn index_for(&self, hash: u32) -> usize {
        (hash as usize) & (self.table.len() - 1)
    }

    #[inline]
    pub(crate) fn entry(&self, id: EntryId) -> Option<&Entry<K, V, X>> {
        self.slots.get(id)
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry<K, V, X>> {
        self.slots.get_mut(id)
    }

    #[inline]
    pub(crate) fn null_entry(&self) -> Option<EntryId> {
        self.null_entry
    }

    /// Locate the chain entry with `hash` whose key satisfies `eq`,
    /// returning it together with its chain predecessor.
    fn locate<F>(&self, hash: u32, mut eq: F) -> Option<(Option<EntryId>, EntryId)>
    where
        F: FnMut(&K) -> bool,
    {
        if self.table.is_empty() {
            return None;
        }
        let _g = self.mods.enter();
        let mut prev = None;
        let mut cur = self.table[self.index_for(hash)];
        while let Some(id) = cur {
            let e = self.slots.get(id)?;
            if e.hash == hash && e.key.as_ref().is_some_and(&mut eq) {
                return Some((prev, id));
            }
            prev = cur;
            cur = e.next;
        }
        None
    }

    pub(crate) fn find<F>(&self, hash: u32, eq: F) -> Option<EntryId>
    where
        F: FnMut(&K) -> bool,
    {
        self.locate(hash, eq).map(|(_, id)| id)
    }

    pub(crate) fn find_mut<F>(&mut self, hash: u32, eq: F) -> Option<&mut Entry<K, V, X>>
    where
        F: FnMut(&K) -> bool,
    {
        let id = self.find(hash, eq)?;
        self.slots.get_mut(id)
    }

    /// Link a new entry at the head of its chain. The caller guarantees
    /// no entry with an equal key exists.
    pub(crate) fn insert_new(&mut self, key: K, hash: u32, value: V, ext: X) -> EntryId {
        if self.table.is_empty() {
            self.rehash(MINIMUM_CAPACITY);
        }
        let index = self.index_for(hash);
        let head = self.table[index];
        let id = self.slots.insert(Entry {
            key: Some(key),
            value,
            hash,
            next: head,
            ext,
        });
        self.table[index] = Some(id);
        self.mods.bump();
        if self.slots.len() > self.threshold {
            self.double_capacity();
        }
        id
    }

    /// Fill the reserved null-key slot. The caller guarantees it is empty.
    pub(crate) fn insert_null(&mut self, value: V, ext: X) -> EntryId {
        debug_assert!(self.null_entry.is_none());
        let id = self.slots.insert(Entry {
            key: None,
            value,
            hash: 0,
            next: None,
            ext,
        });
        self.null_entry = Some(id);
        self.mods.bump();
        id
    }

    pub(crate) fn remove_where<F>(&mut self, hash: u32, eq: F) -> Option<(EntryId, Entry<K, V, X>)>
    where
        F: FnMut(&K) -> bool,
    {
        let (prev, id) = self.locate(hash, eq)?;
        let entry = self.unlink(prev, id)?;
        Some((id, entry))
    }

    pub(crate) fn remove_null(&mut self) -> Option<Entry<K, V, X>> {
        let id = self.null_entry.take()?;
        let entry = self.slots.remove(id)?;
        self.mods.bump();
        Some(entry)
    }

    /// Remove an entry by arena index. Stale indices yield `None`.
    pub(crate) fn remove_id(&mut self, id: EntryId) -> Option<Entry<K, V, X>> {
        if self.null_entry == Some(id) {
            return self.remove_null();
        }
        let hash = self.slots.get(id)?.hash;
        let mut prev = None;
        let mut cur = self.table[self.index_for(hash)];
        while let Some(c) = cur {
            if c == id {
                return self.unlink(prev, id);
            }
            prev = cur;
            cur = self.slots.get(c)?.next;
        }
        None
    }

    fn unlink(&mut self, prev: Option<EntryId>, id: EntryId) -> Option<Entry<K, V, X>> {
        let entry = self.slots.remove(id)?;
        match prev {
            None => {
                let index = self.index_for(entry.hash);
                self.table[index] = entry.next;
            }
            Some(p) => {
                if let Some(pe) = self.slots.get_mut(p) {
                    pe.next = entry.next;
                }
            }
        }
        self.mods.bump();
        Some(entry)
    }

    pub(crate) fn clear(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        self.table.fill(None);
        self.slots.clear();
        self.null_entry = None;
        self.mods.bump();
    }

    /// Grow the table so `mappings` entries fit without further doubling.
    pub(crate) fn ensure_capacity(&mut self, mappings: usize) {
        let wanted = table_capacity(capacity_for_init_size(mappings));
        if wanted > self.table.len() {
            self.rehash(wanted);
        }
    }

    fn double_capacity(&mut self) {
        let old_capacity = self.table.len();
        if old_capacity >= MAXIMUM_CAPACITY {
            return;
        }
        self.rehash((old_capacity * 2).max(MINIMUM_CAPACITY));
    }

    /// Move every chain entry into a table of `new_capacity` buckets.
    /// Entries that share a new bucket keep their relative chain order.
    fn rehash(&mut self, new_capacity: usize) {
        let old = mem::replace(&mut self.table, vec![None; new_capacity]);
        self.threshold = threshold_for(new_capacity, self.load_factor);
        let mask = new_capacity - 1;
        let mut tails: Vec<Option<EntryId>> = vec![None; new_capacity];
        for head in old {
            let mut cur = head;
            while let Some(id) = cur {
                let Some(e) = self.slots.get_mut(id) else {
                    break;
                };
                cur = e.next.take();
                let index = (e.hash as usize) & mask;
                match tails[index] {
                    None => self.table[index] = Some(id),
                    Some(tail) => {
                        if let Some(t) = self.slots.get_mut(tail) {
                            t.next = Some(id);
                        }
                    }
                }
                tails[index] = Some(id);
            }
        }
        self.mods.bump();
        debug!(
            "hash store resized to {} buckets ({} entries, threshold {})",
            new_capacity,
            self.slots.len(),
            self.threshold
        );
    }

    /// Step `pos` to the next entry in iteration order: the null slot
    /// first, then buckets in index order, each chain head to tail.
    pub(crate) fn advance(&self, pos: &mut ChainPos) -> Option<EntryId> {
        if pos.null_pending {
            pos.null_pending = false;
            if let Some(id) = self.null_entry {
                return Some(id);
            }
        }
        loop {
            if let Some(id) = pos.next {
                match self.slots.get(id) {
                    Some(e) => {
                        pos.next = e.next;
                        return Some(id);
                    }
                    None => pos.next = None,
                }
            }
            if pos.bucket >= self.table.len() {
                return None;
            }
            pos.next = self.table[pos.bucket];
            pos.bucket += 1;
        }
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V, X, S> {
        Iter {
            store: self,
            pos: ChainPos::start(),
            remaining: self.slots.len(),
        }
    }

    /// Mutable walk in arena order (not chain order).
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (EntryId, &mut Entry<K, V, X>)> {
        self.slots.iter_mut()
    }

    pub(crate) fn into_entries(self) -> slotmap::basic::IntoIter<EntryId, Entry<K, V, X>> {
        self.slots.into_iter()
    }

    /// Remove every entry for which `keep` returns false.
    pub(crate) fn retain<F>(&mut self, mut keep: F) -> Vec<(EntryId, Entry<K, V, X>)>
    where
        F: FnMut(&mut Entry<K, V, X>) -> bool,
    {
        let doomed: Vec<EntryId> = self
            .slots
            .iter_mut()
            .filter_map(|(id, e)| if keep(e) { None } else { Some(id) })
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| self.remove_id(id).map(|e| (id, e)))
            .collect()
    }
}

impl<K, V, X, S> BucketStore<K, V, X, S>
where
    S: BuildHasher,
{
    /// Spread hash of any value hashing like the stored keys.
    #[inline]
    pub(crate) fn hash_key<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        let _g = self.mods.enter();
        spread(fold(self.hasher.hash_one(q)))
    }
}

/// Resumable position in chain iteration order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChainPos {
    null_pending: bool,
    bucket: usize,
    next: Option<EntryId>,
}

impl ChainPos {
    pub(crate) fn start() -> Self {
        Self {
            null_pending: true,
            bucket: 0,
            next: None,
        }
    }
}

/// Borrowing iterator in chain order.
pub(crate) struct Iter<'a, K, V, X, S> {
    store: &'a BucketStore<K, V, X, S>,
    pos: ChainPos,
    remaining: usize,
}

impl<'a, K, V, X, S> Iterator for Iter<'a, K, V, X, S> {
    type Item = (EntryId, &'a Entry<K, V, X>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let id = self.store.advance(&mut self.pos)?;
        let e = self.store.slots.get(id)?;
        self.remaining = self.remaining.saturating_sub(1);
        Some((id, e))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, X, S> ExactSizeIterator for Iter<'_, K, V, X, S> {}

/// Fail-fast cursor state over a store: a position, the modification
/// count it was created under, and the last entry it reported.
///
/// Holds only indices, so it never borrows the store between calls.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChainCursor {
    expected: u64,
    pos: ChainPos,
    last: Option<EntryId>,
}

impl ChainCursor {
    pub(crate) fn new<K, V, X, S>(store: &BucketStore<K, V, X, S>) -> Self {
        Self {
            expected: store.mods.count(),
            pos: ChainPos::start(),
            last: None,
        }
    }

    /// Advance one entry, failing if the store changed underneath.
    pub(crate) fn step<K, V, X, S>(
        &mut self,
        store: &BucketStore<K, V, X, S>,
    ) -> Result<Option<EntryId>> {
        store.mods.check(self.expected)?;
        self.last = store.advance(&mut self.pos);
        Ok(self.last)
    }

    /// Remove the last reported entry and resynchronize with the store.
    pub(crate) fn remove_last<K, V, X, S>(
        &mut self,
        store: &mut BucketStore<K, V, X, S>,
    ) -> Result<(EntryId, Entry<K, V, X>)> {
        let id = self
            .last
            .take()
            .ok_or(Error::IllegalState("remove() without a preceding next()"))?;
        store.mods.check(self.expected)?;
        let entry = store.remove_id(id).ok_or(Error::ConcurrentModification)?;
        self.expected = store.mods.count();
        Ok((id, entry))
    }
}
