//! Copying Across the User/Kernel Boundary
//!
//! User pointers are never dereferenced. Every access walks the owning
//! address space page by page and touches the backing frame through the
//! [`FrameAllocator`], so a bad pointer can only ever produce an error.
//!
//! # Security Principles
//! - Reads require a user-readable page, writes a user-writable one
//! - Writes check the whole destination range before the first byte lands
//! - Data is copied into kernel buffers, so later user changes cannot race
//!   with validation (TOCTOU)

use super::addrspace::AddressSpace;
use super::address::{PhysAddr, VirtAddr, PAGE_SIZE};
use super::frame::FrameAllocator;
use super::paging::{MappingError, PteFlags};

impl AddressSpace {
    /// Resolve a user address to its physical address, or `None` if unmapped.
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.resolve(va, PteFlags::empty()).ok()
    }

    /// Resolve `va` through a user leaf granting `perms`.
    pub fn resolve(&self, va: VirtAddr, perms: PteFlags) -> Result<PhysAddr, MappingError> {
        let entry = self.page_table().entry(va.page()).ok_or(MappingError::NotMapped)?;
        if !entry.permits(perms) {
            return Err(MappingError::PermissionDenied);
        }
        Ok(entry.addr().add(va.page_offset()))
    }

    /// Check that every page of `[va, va + len)` is mapped with `perms`.
    pub fn check_range(&self, va: VirtAddr, len: usize, perms: PteFlags) -> Result<(), MappingError> {
        if len == 0 {
            return Ok(());
        }
        let last = va.checked_add(len - 1).ok_or(MappingError::OutOfRange)?;
        let mut page = va.page();
        while page <= last.page() {
            self.resolve(page.start(), perms)?;
            page = page.next();
        }
        Ok(())
    }

    /// Copy `dst.len()` bytes from user address `src` into `dst`.
    pub fn copy_in<A: FrameAllocator + ?Sized>(
        &self,
        frames: &A,
        dst: &mut [u8],
        src: VirtAddr,
    ) -> Result<(), MappingError> {
        let mut done = 0;
        while done < dst.len() {
            let va = src.checked_add(done).ok_or(MappingError::OutOfRange)?;
            let pa = self.resolve(va, PteFlags::R)?;
            let n = (PAGE_SIZE - pa.page_offset()).min(dst.len() - done);
            let frame = frames.frame(pa.align_down());
            dst[done..done + n].copy_from_slice(&frame[pa.page_offset()..pa.page_offset() + n]);
            done += n;
        }
        Ok(())
    }

    /// Copy a NUL-terminated string of at most `max_len` bytes from `src`.
    ///
    /// Returns the number of bytes stored in `dst`, terminator excluded. Stops
    /// at the first NUL, at `max_len`, or when `dst` is full. Running into an
    /// unmapped page before any of those is a fault, not a short string.
    pub fn copy_in_string<A: FrameAllocator + ?Sized>(
        &self,
        frames: &A,
        dst: &mut [u8],
        src: VirtAddr,
        max_len: usize,
    ) -> Result<usize, MappingError> {
        let limit = max_len.min(dst.len());
        let mut done = 0;
        while done < limit {
            let va = src.checked_add(done).ok_or(MappingError::OutOfRange)?;
            let pa = self.resolve(va, PteFlags::R)?;
            let n = (PAGE_SIZE - pa.page_offset()).min(limit - done);
            let chunk = &frames.frame(pa.align_down())[pa.page_offset()..pa.page_offset() + n];
            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                dst[done..done + nul].copy_from_slice(&chunk[..nul]);
                return Ok(done + nul);
            }
            dst[done..done + n].copy_from_slice(chunk);
            done += n;
        }
        Ok(done)
    }

    /// Copy `src` to user address `dst`.
    ///
    /// Fails without writing anything unless the whole destination is mapped
    /// writable.
    pub fn copy_out<A: FrameAllocator + ?Sized>(
        &self,
        frames: &mut A,
        dst: VirtAddr,
        src: &[u8],
    ) -> Result<(), MappingError> {
        self.check_range(dst, src.len(), PteFlags::W)?;
        let mut done = 0;
        while done < src.len() {
            let va = dst.checked_add(done).ok_or(MappingError::OutOfRange)?;
            let pa = self.resolve(va, PteFlags::W)?;
            let n = (PAGE_SIZE - pa.page_offset()).min(src.len() - done);
            let frame = frames.frame_mut(pa.align_down());
            frame[pa.page_offset()..pa.page_offset() + n].copy_from_slice(&src[done..done + n]);
            done += n;
        }
        Ok(())
    }
}
