//! Memory system calls: `sbrk`, `mmap` and `munmap`.

use crate::error::{SysError, SysResult};
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{FrameAllocator, VirtAddr};

use super::validate::{validate_port, validate_user_range};

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    /// Move the caller's program break by `delta`; returns the old break.
    pub(crate) fn sys_sbrk(&mut self, delta: isize) -> SysResult<isize> {
        let pcb = self.procs.caller_pcb_mut()?;
        let old = pcb.space.grow_break(&mut self.frames, delta)?;
        Ok(old.as_usize() as isize)
    }

    /// Map fresh zeroed pages at `start` with protection bits `port`.
    pub(crate) fn sys_mmap(&mut self, start: usize, len: usize, port: usize) -> SysResult<isize> {
        if len == 0 {
            return Ok(0);
        }
        let perms = validate_port(port)?;
        let range = validate_user_range(start, len)?;
        let pcb = self.procs.caller_pcb_mut()?;
        pcb.space
            .map(&mut self.frames, range.start(), range.len(), perms)?;
        Ok(0)
    }

    /// Unmap `len` bytes at `start`; every page in the range must be mapped.
    pub(crate) fn sys_munmap(&mut self, start: usize, len: usize) -> SysResult<isize> {
        if !VirtAddr::new(start).is_aligned() {
            return Err(SysError::BadAlignment);
        }
        if len == 0 {
            return Ok(0);
        }
        let range = validate_user_range(start, len)?;
        let pcb = self.procs.caller_pcb_mut()?;
        pcb.space.unmap(&mut self.frames, range.start(), range.len())?;
        Ok(0)
    }
}
