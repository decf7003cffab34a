//! chained-collections: chained hash maps and sets (plain, linked and
//! weak-keyed) plus a thread-per-timer task scheduler.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one hash-table skeleton shared by every map, with ordering and
//!   weak-key behavior layered on top instead of re-implemented.
//! - Layers:
//!   - BucketStore<K, V, X, S>: separate-chaining table over a
//!     generational arena. Chains link entries by arena index; `X` is a
//!     per-entry payload for upper layers. Owns the modification count
//!     and a debug-only reentrancy guard.
//!   - HashMap / HashSet: the store with `X = ()`.
//!   - LinkedHashMap / LinkedHashSet: `X` holds `before`/`after` links of
//!     a circular list anchored at a header owned by the map. Insertion
//!     or access order; optional eviction of the eldest entry.
//!   - WeakHashMap: keys held as `WeakKeyRef`s. Dying keys push their
//!     entry index onto the map's reclamation queue, drained lazily.
//!   - Timer / TimerTask: a binary min-heap of deadlines drained by one
//!     background thread per timer.
//!
//! Null key
//! - Every map has one reserved slot for the null key, reached through
//!   the `*_null` methods. It never enters a chain and is reported as a
//!   `None` key by iterators and cursors.
//!
//! Fail-fast iteration
//! - Borrowing iterators (`iter`, `keys`, `values`) are protected by the
//!   borrow checker. Cursors hold only indices and the modification
//!   count they started from, so the map can be mutated through the
//!   cursor between steps. Any other structural change is reported as
//!   `Error::ConcurrentModification` on the next step.
//! - Structural: insert of a new key, removal, `clear` on a non-empty
//!   map, resize, weak reclamation, and access-order touches. Replacing
//!   a value is not structural.
//! - The count detects misuse in single-owner code. It says nothing about
//!   thread safety.
//!
//! Threading
//! - Maps are not synchronized; `WeakHashMap` is `!Send`/`!Sync`.
//! - `Timer` is `Send + Sync`. Scheduling calls and the timer thread
//!   share one mutex-protected heap; task bodies run with no lock held.
//!
//! Notes and non-goals
//! - No persistence or wire format.
//! - No thread pool; one thread per timer.
//! - `Timer::close` is the deterministic shutdown. Dropping a timer lets
//!   its thread drain queued one-shot work and exit.

mod bucket_store;
pub mod config;
pub mod error;
pub mod hash_map;
pub mod hash_set;
pub mod linked_hash_map;
pub mod linked_hash_set;
mod mod_tracker;
mod task_heap;
pub mod timer;
pub mod timer_task;
pub mod weak_hash_map;
pub mod weak_key;

mod hash_map_proptest;

// Public surface
pub use config::{MapConfig, TimerConfig};
pub use error::{Error, Result};
pub use hash_map::{Cursor, HashMap, KeySet};
pub use hash_set::{HashSet, SetCursor};
pub use linked_hash_map::{
    EvictionPolicy, LinkedCursor, LinkedHashMap, MaxEntries, NeverEvict, Order,
};
pub use linked_hash_set::{LinkedHashSet, LinkedSetCursor};
pub use timer::{Start, Timer};
pub use timer_task::{TaskState, TimerTask};
pub use weak_hash_map::{WeakCursor, WeakHashMap};
pub use weak_key::{KeyRef, WeakKeyRef};
