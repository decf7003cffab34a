//! Per-container modification tracking.
//!
//! `ModTracker` carries the structural modification count that cursors
//! compare against to fail fast, plus a debug-only reentrancy guard that
//! catches nested entry into a store while its chains are being spliced.
//! In release builds the guard compiles to nothing; the count is always
//! maintained.
//!
//! The count is a misuse detector for single-owner code. It is not a
//! synchronization mechanism and says nothing about thread safety.

#[cfg(debug_assertions)]
use core::cell::Cell;
#[cfg(not(debug_assertions))]
use core::marker::PhantomData;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct ModTracker {
    count: u64,
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
}

impl ModTracker {
    pub(crate) const fn new() -> Self {
        Self {
            count: 0,
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    /// Record one structural change.
    #[inline]
    pub(crate) fn bump(&mut self) {
        self.count = self.count.wrapping_add(1);
    }

    /// Fail with `ConcurrentModification` unless nothing changed since
    /// `expected` was sampled.
    #[inline]
    pub(crate) fn check(&self, expected: u64) -> Result<()> {
        if self.count == expected {
            Ok(())
        } else {
            Err(Error::ConcurrentModification)
        }
    }

    /// Enter a critical section. Panics in debug builds if one is
    /// already open on this tracker.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(d == 0, "reentrancy detected: nested entry into hash store");
            self.depth.set(d + 1);
            Section { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Section { _z: PhantomData }
        }
    }
}

impl Clone for ModTracker {
    // A clone is a fresh container; its cursors start from zero.
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`ModTracker::enter`].
pub(crate) struct Section<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ModTracker,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}
