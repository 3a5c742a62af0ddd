//! Point-in-time history of a counter.
//!
//! Each mutation appends `(timepoint, value)`; several mutations at the
//! same timepoint collapse into one entry. Lookups binary-search the
//! history, so snapshot reads stay O(log n) however long it grows.

use civitas_types::Timepoint;

/// Value of a counter from `from` onwards, until the next checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub from: Timepoint,
    pub value: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Checkpoints {
    history: Vec<Checkpoint>,
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value (zero before the first checkpoint).
    pub fn latest(&self) -> u64 {
        self.history.last().map(|c| c.value).unwrap_or(0)
    }

    /// Record `value` as of `at`. Returns `(previous, value)`.
    ///
    /// Timepoints must be non-decreasing; the registry rejects stale ones
    /// before any ledger mutation.
    pub(crate) fn push(&mut self, at: Timepoint, value: u64) -> (u64, u64) {
        let previous = self.latest();
        match self.history.last_mut() {
            Some(last) if last.from == at => last.value = value,
            Some(last) if last.from > at => {
                debug_assert!(false, "checkpoint at {} after {}", at, last.from);
                last.value = value;
            }
            _ => self.history.push(Checkpoint { from: at, value }),
        }
        (previous, value)
    }

    /// Value as of the end of timepoint `at`.
    pub fn upper_lookup(&self, at: Timepoint) -> u64 {
        let idx = self.history.partition_point(|c| c.from <= at);
        if idx == 0 {
            0
        } else {
            self.history[idx - 1].value
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
