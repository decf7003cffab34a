//! Reference-counted keys that notify maps when they die.
//!
//! A [`KeyRef`] is a strong, cheaply clonable handle to a key value.
//! Maps that hold a key weakly register the arena index of their entry
//! with the key's referent. When the last strong handle is dropped the
//! referent pushes every registered index onto the owning map's
//! [`ReclaimQueue`], and the map unlinks those entries the next time it
//! drains the queue.
//!
//! Queue pushes happen from `Drop`, so they can fire in the middle of a
//! map operation that drops a value holding a `KeyRef`. The queue is
//! only ever borrowed for a single push or pop, never across a call
//! that may drop user data.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::bucket_store::EntryId;

type Pending = RefCell<VecDeque<EntryId>>;

struct Registration {
    queue: Weak<Pending>,
    id: EntryId,
}

struct Referent<K> {
    value: K,
    registrations: RefCell<Vec<Registration>>,
}

impl<K> Drop for Referent<K> {
    fn drop(&mut self) {
        for r in self.registrations.get_mut().drain(..) {
            if let Some(queue) = r.queue.upgrade() {
                queue.borrow_mut().push_back(r.id);
            }
        }
    }
}

/// Strong handle to a key that can be held weakly by a
/// [`WeakHashMap`](crate::WeakHashMap).
///
/// Equality and hashing delegate to the key value, so two handles made
/// from equal values name the same mapping.
pub struct KeyRef<K> {
    inner: Rc<Referent<K>>,
}

impl<K> KeyRef<K> {
    pub fn new(value: K) -> Self {
        Self {
            inner: Rc::new(Referent {
                value,
                registrations: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn downgrade(this: &Self) -> WeakKeyRef<K> {
        WeakKeyRef {
            inner: Rc::downgrade(&this.inner),
        }
    }

    /// Number of live strong handles to this key.
    pub fn strong_count(this: &Self) -> usize {
        Rc::strong_count(&this.inner)
    }

    /// True when both handles share one referent.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.inner, &other.inner)
    }

    /// Ask to have `id` pushed onto `queue` once this key dies.
    /// Registrations for queues that no longer exist are pruned first.
    pub(crate) fn register(&self, queue: &ReclaimQueue, id: EntryId) {
        let mut regs = self.inner.registrations.borrow_mut();
        regs.retain(|r| r.queue.strong_count() > 0);
        regs.push(Registration {
            queue: Rc::downgrade(&queue.pending),
            id,
        });
    }

    pub(crate) fn unregister(&self, queue: &ReclaimQueue, id: EntryId) {
        let target = Rc::downgrade(&queue.pending);
        self.inner.registrations.borrow_mut().retain(|r| {
            r.queue.strong_count() > 0 && !(r.id == id && r.queue.ptr_eq(&target))
        });
    }

    #[cfg(test)]
    pub(crate) fn registration_count(this: &Self) -> usize {
        RefCell::borrow(&this.inner.registrations).len()
    }
}

impl<K> Clone for KeyRef<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> Deref for KeyRef<K> {
    type Target = K;

    fn deref(&self) -> &K {
        &self.inner.value
    }
}

impl<K> Borrow<K> for KeyRef<K> {
    fn borrow(&self) -> &K {
        &self.inner.value
    }
}

impl<K> From<K> for KeyRef<K> {
    fn from(value: K) -> Self {
        Self::new(value)
    }
}

impl<K: PartialEq> PartialEq for KeyRef<K> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.value == other.inner.value
    }
}

impl<K: Eq> Eq for KeyRef<K> {}

impl<K: Hash> Hash for KeyRef<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.value.hash(state);
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyRef").field(&self.inner.value).finish()
    }
}

/// Non-owning handle to a [`KeyRef`]'s referent.
pub struct WeakKeyRef<K> {
    inner: Weak<Referent<K>>,
}

impl<K> WeakKeyRef<K> {
    /// A strong handle, or `None` once every strong handle is gone.
    pub fn upgrade(&self) -> Option<KeyRef<K>> {
        self.inner.upgrade().map(|inner| KeyRef { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Apply `f` to the key value if the key is still alive.
    pub(crate) fn with_key<R>(&self, f: impl FnOnce(&K) -> R) -> Option<R> {
        let strong = self.inner.upgrade()?;
        Some(f(&strong.value))
    }
}

impl<K> Clone for WeakKeyRef<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<K> fmt::Debug for WeakKeyRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKeyRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Indices of entries whose keys have died, owned by one map.
#[derive(Default)]
pub(crate) struct ReclaimQueue {
    pending: Rc<Pending>,
}

impl ReclaimQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take one pending index. The queue is not borrowed afterwards.
    pub(crate) fn pop(&self) -> Option<EntryId> {
        self.pending.borrow_mut().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        RefCell::borrow(&self.pending).len()
    }
}
