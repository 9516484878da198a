//! # Work Queue
//!
//! Lock-free dispenser of `(p_idx, c_idx)` work units.
//!
//! The unit list is built once and never changes; workers share a single
//! atomic cursor into it. The cursor is advanced with a compare-and-swap that
//! refuses to move past the end, so the dispensed count can never exceed the
//! total and each unit is handed out exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};

/// One `(p, c)` slab of the output grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkUnit {
    pub p_idx: usize,
    pub c_idx: usize,
}

impl WorkUnit {
    pub fn new(p_idx: usize, c_idx: usize) -> Self {
        Self { p_idx, c_idx }
    }

    /// Slab index in `[c][p]` order
    #[inline]
    pub fn slab_index(self, n_p: usize) -> usize {
        self.c_idx * n_p + self.p_idx
    }
}

/// Thread-safe dispenser of immutable work units
#[derive(Debug)]
pub struct WorkQueue {
    units: Vec<WorkUnit>,
    cursor: AtomicUsize,
}

impl WorkQueue {
    /// Cartesian product of the two outer ranges, `c`-major so the unit at
    /// position `i` owns slab `i`.
    pub fn new(n_p: usize, n_c: usize) -> Self {
        let units = (0..n_c)
            .flat_map(|c_idx| (0..n_p).map(move |p_idx| WorkUnit::new(p_idx, c_idx)))
            .collect();
        Self {
            units,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unit, or `None` once every unit has been dispensed
    #[inline]
    pub fn next(&self) -> Option<WorkUnit> {
        let total = self.units.len();
        self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                (i < total).then_some(i + 1)
            })
            .ok()
            .map(|i| self.units[i])
    }

    /// `(dispensed, total)`
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor.load(Ordering::Acquire), self.units.len())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        let (dispensed, total) = self.progress();
        dispensed >= total
    }
}
