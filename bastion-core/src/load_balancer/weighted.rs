//! Weighted round robin distribution table.
//!
//! The table repeats each backend index `weight` times in configuration order,
//! so weights `(3, 1)` produce `[0, 0, 0, 1]`. A shared cursor dispenses one slot
//! per call and wraps at the end of the table.
//!
//! Every cursor advance is a single atomic read-modify-write, which makes the
//! fairness guarantee hold over the sequence of cursor advances. Under concurrent
//! dispatch that order is not wall-clock request order.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An interleaved slot table with a lock-free rotation cursor.
#[derive(Debug)]
pub struct WeightedDistribution {
    slots: Vec<usize>,
    cursor: AtomicUsize,
}

impl WeightedDistribution {
    /// Build the slot table from weights given in backend order.
    pub fn new<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = NonZeroU32>,
    {
        let slots = weights
            .into_iter()
            .enumerate()
            .flat_map(|(idx, weight)| std::iter::repeat_n(idx, weight.get() as usize))
            .collect();

        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of slots, i.e. the sum of all weights.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The raw slot table.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Current cursor position, always in `[0, len)`.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Dispense the slot under the cursor and move the cursor one step forward.
    pub fn advance(&self) -> Option<usize> {
        let len = self.slots.len();
        if len == 0 {
            return None;
        }

        // fetch_update only fails when the closure returns None, which it never does.
        let position = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };

        Some(self.slots[position])
    }

    /// Scan at most one full cycle for a slot whose backend passes `is_alive`.
    ///
    /// Each probed slot consumes one cursor tick, so dead backends are skipped
    /// without changing the relative order of the live ones.
    pub fn next_matching<F>(&self, mut is_alive: F) -> Option<usize>
    where
        F: FnMut(usize) -> bool,
    {
        (0..self.slots.len())
            .filter_map(|_| self.advance())
            .find(|&idx| is_alive(idx))
    }
}
