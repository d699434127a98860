//! Kernel Configuration
//!
//! Compile-time limits shared by the memory and process subsystems, plus the
//! small runtime [`KernelConfig`] handed to [`crate::Kernel::new`].

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of process control blocks.
pub const NPROC: usize = 64;

/// Size of the per-process syscall counter table.
pub const MAX_SYSCALL_NUM: usize = 500;

/// Cycle counter frequency of the QEMU virt board.
pub const CPU_FREQ: u64 = 12_500_000;

/// Longest buffer accepted by `write` in one call.
pub const MAX_STR_LEN: usize = 200;

/// Longest program name accepted by `execve` and `spawn`.
pub const MAX_PATH_LEN: usize = 200;

/// First user virtual address; page 0 stays unmapped so null is always a fault.
pub const USER_BASE: usize = 0x1000;

/// Exclusive upper bound of the user half of the address space (Sv39 user half).
pub const USER_TOP: usize = 0x40_0000_0000;

/// User stack size, in bytes.
pub const USER_STACK_SIZE: usize = 2 * PAGE_SIZE;

/// Priority given to freshly created processes.
pub const DEFAULT_PRIORITY: usize = 16;

/// Smallest priority `set_priority` accepts.
pub const MIN_PRIORITY: isize = 2;

/// Stride numerator; a process advances by `BIG_STRIDE / priority` per turn.
pub const BIG_STRIDE: u64 = 65_536;

/// Pid reported by `getppid` for parentless processes.
pub const IDLE_PID: usize = 0;

/// Runtime knobs for a [`crate::Kernel`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Capacity of the process table.
    pub max_processes: usize,
    /// Cycle counter frequency used for time conversions.
    pub cpu_freq: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: NPROC,
            cpu_freq: CPU_FREQ,
        }
    }
}
