//! Process Control Blocks

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::config::{BIG_STRIDE, DEFAULT_PRIORITY, MAX_SYSCALL_NUM};
use crate::mm::AddressSpace;
use crate::trap::TrapFrame;

/// Process identifier. Assigned monotonically and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(pub usize);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a process table slot.
///
/// Slots are small and stable for the life of a process, which makes them
/// the right thing to store in parent/child links. A slot is only reused
/// after its process has been reaped and unlinked everywhere.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Slot(pub(crate) usize);

impl Slot {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle state of a process table slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessState {
    Unused,
    Runnable,
    Running,
    Zombie,
}

/// Everything the kernel knows about one process.
pub struct ProcessControlBlock {
    pub(crate) pid: Pid,
    pub(crate) state: ProcessState,
    pub(crate) space: AddressSpace,
    /// Non-owning back-link; `None` for the root process and orphans of it.
    pub(crate) parent: Option<Slot>,
    pub(crate) children: Vec<Slot>,
    pub(crate) priority: usize,
    /// Stride-scheduling position; the smallest stride runs next.
    pub(crate) stride: u64,
    pub(crate) syscall_times: Box<[u32; MAX_SYSCALL_NUM]>,
    /// Cycle counter value at creation.
    pub(crate) start_cycles: u64,
    /// Only meaningful once the process is a zombie.
    pub(crate) exit_code: i32,
    pub(crate) trap_frame: TrapFrame,
}

impl ProcessControlBlock {
    pub(crate) fn new(pid: Pid, space: AddressSpace, start_cycles: u64) -> Self {
        Self {
            pid,
            state: ProcessState::Runnable,
            space,
            parent: None,
            children: Vec::new(),
            priority: DEFAULT_PRIORITY,
            stride: 0,
            syscall_times: Box::new([0; MAX_SYSCALL_NUM]),
            start_cycles,
            exit_code: 0,
            trap_frame: TrapFrame::zeroed(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn parent(&self) -> Option<Slot> {
        self.parent
    }

    pub fn children(&self) -> &[Slot] {
        &self.children
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn trap_frame(&self) -> &TrapFrame {
        &self.trap_frame
    }

    pub fn trap_frame_mut(&mut self) -> &mut TrapFrame {
        &mut self.trap_frame
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn start_cycles(&self) -> u64 {
        self.start_cycles
    }

    /// Invocation counters, indexed by request identifier.
    pub fn syscall_times(&self) -> &[u32; MAX_SYSCALL_NUM] {
        &self.syscall_times
    }

    /// Count one invocation of request `id`. Ids outside the table are ignored.
    pub(crate) fn count_syscall(&mut self, id: usize) {
        if let Some(count) = self.syscall_times.get_mut(id) {
            *count = count.saturating_add(1);
        }
    }

    /// Stride advance per turn; never zero, so every process keeps moving.
    #[inline]
    pub(crate) fn pass(&self) -> u64 {
        (BIG_STRIDE / self.priority as u64).max(1)
    }
}

impl fmt::Debug for ProcessControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessControlBlock")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("priority", &self.priority)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}
