//! Process Table
//!
//! A fixed-capacity arena of process control blocks. The capacity is set
//! once at construction and never grows.
//!
//! # Design
//! - Slots are addressed by [`Slot`] indices
//! - Pids come from a monotonic counter and are never reused
//! - Operations: alloc, lookup by slot (O(1)), lookup by pid, free

use alloc::vec::Vec;

use super::pcb::{Pid, ProcessControlBlock, ProcessState, Slot};
use crate::error::{SysError, SysResult};
use crate::mm::AddressSpace;

pub struct ProcessTable {
    slots: Vec<Option<ProcessControlBlock>>,
    next_pid: usize,
}

impl ProcessTable {
    /// Create a table with room for `capacity` processes. Pids start at 1.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, next_pid: 1 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim a free slot for a new process owning `space`.
    pub fn alloc(&mut self, space: AddressSpace, now: u64) -> SysResult<Slot> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SysError::TooManyProcesses)?;
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        self.slots[index] = Some(ProcessControlBlock::new(pid, space, now));
        Ok(Slot(index))
    }

    /// Release a slot, handing back its control block.
    ///
    /// # Panics
    /// Panics if the slot is already free.
    pub fn free(&mut self, slot: Slot) -> ProcessControlBlock {
        match self.slots.get_mut(slot.0).and_then(Option::take) {
            Some(pcb) => pcb,
            None => {
                log::error!("freeing unused process slot {}", slot.0);
                panic!("process slot {} is not in use", slot.0);
            }
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&ProcessControlBlock> {
        self.slots.get(slot.0)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut ProcessControlBlock> {
        self.slots.get_mut(slot.0)?.as_mut()
    }

    /// Control block in `slot`, which the caller knows to be occupied.
    ///
    /// # Panics
    /// Panics if the slot is empty: a dangling link means kernel state is corrupt.
    pub fn expect(&self, slot: Slot) -> &ProcessControlBlock {
        match self.get(slot) {
            Some(pcb) => pcb,
            None => dangling(slot),
        }
    }

    /// Mutable variant of [`ProcessTable::expect`].
    pub fn expect_mut(&mut self, slot: Slot) -> &mut ProcessControlBlock {
        match self.slots.get_mut(slot.0).and_then(Option::as_mut) {
            Some(pcb) => pcb,
            None => dangling(slot),
        }
    }

    /// Find the slot of the live or zombie process `pid`.
    pub fn find(&self, pid: Pid) -> Option<Slot> {
        self.iter().find(|(_, pcb)| pcb.pid == pid).map(|(slot, _)| slot)
    }

    /// State of a slot; empty slots report [`ProcessState::Unused`].
    pub fn state(&self, slot: Slot) -> ProcessState {
        self.get(slot).map_or(ProcessState::Unused, |pcb| pcb.state)
    }

    /// Iterate over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ProcessControlBlock)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|pcb| (Slot(i), pcb)))
    }
}

fn dangling(slot: Slot) -> ! {
    log::error!("link to empty process slot {}", slot.0);
    panic!("dangling process link to slot {}", slot.0);
}
