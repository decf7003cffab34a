//! Construction-time settings for the hash containers and the timer.

use crate::error::{Error, Result};

/// Default load factor used when none is configured.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Default number of slots reserved in a timer's task heap.
pub const DEFAULT_HEAP_CAPACITY: usize = 16;

/// Sizing knobs for every hash container in this crate.
///
/// A zero `initial_capacity` defers table allocation until the first
/// insertion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapConfig {
    /// Requested bucket count. Rounded up to a power of two and clamped
    /// to the supported range.
    pub initial_capacity: usize,
    /// Fraction of the bucket count the map may fill before doubling.
    pub load_factor: f32,
}

impl MapConfig {
    pub const fn new() -> Self {
        Self {
            initial_capacity: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Rejects non-positive or NaN load factors.
    pub fn validate(&self) -> Result<()> {
        if self.load_factor.is_nan() || self.load_factor <= 0.0 {
            return Err(Error::illegal_argument(format!(
                "load factor: {}",
                self.load_factor
            )));
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for a [`Timer`](crate::Timer) and its background thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerConfig {
    /// Name given to the scheduler thread.
    pub name: String,
    /// Slots reserved up front in the task heap.
    pub initial_heap_capacity: usize,
}

impl TimerConfig {
    pub fn new() -> Self {
        Self {
            name: "timer".to_string(),
            initial_heap_capacity: DEFAULT_HEAP_CAPACITY,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn initial_heap_capacity(mut self, capacity: usize) -> Self {
        self.initial_heap_capacity = capacity;
        self
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::new()
    }
}
