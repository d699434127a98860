//! Stride Scheduler
//!
//! Priority-weighted selection: every runnable process carries a stride and
//! advances it by `BIG_STRIDE / priority` (at least 1) each time it is
//! picked. The queue always picks the smallest stride, so over time a
//! process runs in proportion to its priority rather than in strict
//! priority order.

use alloc::collections::VecDeque;

use super::pcb::Slot;
use super::table::ProcessTable;

/// Run queue of runnable processes.
#[derive(Debug, Default)]
pub struct RunQueue {
    ready: VecDeque<Slot>,
}

impl RunQueue {
    pub const fn new() -> Self {
        Self {
            ready: VecDeque::new(),
        }
    }

    /// Make `slot` eligible to run.
    pub fn push(&mut self, slot: Slot) {
        debug_assert!(!self.ready.contains(&slot), "slot queued twice");
        self.ready.push_back(slot);
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Take the queued process with the smallest stride and charge it one pass.
    ///
    /// Ties go to the process queued first.
    pub fn pick(&mut self, table: &mut ProcessTable) -> Option<Slot> {
        let (pos, _) = self
            .ready
            .iter()
            .enumerate()
            .min_by_key(|&(pos, &slot)| (table.expect(slot).stride, pos))?;
        let slot = self.ready.remove(pos)?;
        let pcb = table.expect_mut(slot);
        pcb.stride = pcb.stride.wrapping_add(pcb.pass());
        Some(slot)
    }
}
