//! `gettimeofday`

use crate::error::SysResult;
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{FrameAllocator, VirtAddr};

/// Wall time since boot as seen by user space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeVal {
    pub sec: u64,
    pub usec: u64,
}

impl TimeVal {
    /// Size of the user-visible structure.
    pub const SIZE: usize = 16;

    /// Convert a cycle count at `freq` Hz.
    pub fn from_cycles(cycles: u64, freq: u64) -> Self {
        let usec = (cycles % freq) as u128 * 1_000_000 / freq as u128;
        Self {
            sec: cycles / freq,
            usec: usec as u64,
        }
    }

    /// Little-endian `{ sec: u64, usec: u64 }`.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..8].copy_from_slice(&self.sec.to_le_bytes());
        bytes[8..].copy_from_slice(&self.usec.to_le_bytes());
        bytes
    }
}

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    pub(crate) fn sys_gettimeofday(&mut self, tv: VirtAddr) -> SysResult<isize> {
        let now = TimeVal::from_cycles(self.platform.cycles(), self.config.cpu_freq);
        self.procs
            .caller_pcb()?
            .space()
            .copy_out(&mut self.frames, tv, &now.to_bytes())?;
        Ok(0)
    }
}
