//! Physical Frame Allocator
//!
//! The address-space code reaches physical memory only through the
//! [`FrameAllocator`] trait: it hands out zeroed frames and exposes their
//! contents as byte slices, the way a direct-mapped kernel window would.
//!
//! [`BitmapFrameAllocator`] is the stock implementation.
//!
//! # Design
//! - Each bit in the bitmap represents one 4KB frame
//! - Bit = 0: frame is free
//! - Bit = 1: frame is allocated
//!
//! # Security Properties
//! - All allocated frames are zeroed before returning
//! - Double-free is detected and causes a panic

use alloc::vec;
use alloc::vec::Vec;

use super::address::{PhysAddr, PAGE_SHIFT, PAGE_SIZE};

/// Source of physical page frames.
pub trait FrameAllocator {
    /// Allocate a single zeroed frame, or `None` when memory is exhausted.
    fn alloc(&mut self) -> Option<PhysAddr>;

    /// Return a frame obtained from [`FrameAllocator::alloc`].
    fn free(&mut self, frame: PhysAddr);

    /// Contents of an allocated frame.
    fn frame(&self, frame: PhysAddr) -> &[u8];

    /// Mutable contents of an allocated frame.
    fn frame_mut(&mut self, frame: PhysAddr) -> &mut [u8];

    /// Number of frames still available.
    fn free_frames(&self) -> usize;
}

/// Bitmap allocator over a contiguous RAM pool starting at `base`.
pub struct BitmapFrameAllocator {
    /// Physical address of frame 0.
    base: PhysAddr,
    /// Bitmap tracking allocated frames (1 = allocated, 0 = free).
    bitmap: Vec<u8>,
    /// Backing storage for every frame, `total_frames * PAGE_SIZE` bytes.
    memory: Vec<u8>,
    /// Number of free frames remaining.
    free_count: usize,
    /// Total frames under management.
    total_frames: usize,
}

impl BitmapFrameAllocator {
    /// Manage `frames` frames of RAM whose first frame sits at `base`.
    ///
    /// # Panics
    /// Panics if `base` is not page-aligned.
    pub fn new(base: PhysAddr, frames: usize) -> Self {
        assert!(base.is_aligned(), "frame pool base must be page-aligned");
        Self {
            base,
            bitmap: vec![0; frames.div_ceil(8)],
            memory: vec![0; frames * PAGE_SIZE],
            free_count: frames,
            total_frames: frames,
        }
    }

    /// Total frames under management.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Set a bit in the bitmap.
    #[inline]
    fn set_bit(&mut self, frame: usize, allocated: bool) {
        let byte_idx = frame / 8;
        let bit_idx = frame % 8;

        if allocated {
            self.bitmap[byte_idx] |= 1 << bit_idx;
        } else {
            self.bitmap[byte_idx] &= !(1 << bit_idx);
        }
    }

    /// Check if a frame is allocated.
    #[inline]
    fn is_allocated(&self, frame: usize) -> bool {
        if frame >= self.total_frames {
            return true; // Out of range = allocated
        }
        (self.bitmap[frame / 8] >> (frame % 8)) & 1 == 1
    }

    /// Frame index of `addr`.
    ///
    /// # Panics
    /// Panics if the address is unaligned or outside the pool; either means a
    /// page table entry has been corrupted.
    fn index_of(&self, addr: PhysAddr) -> usize {
        if !addr.is_aligned() {
            log::error!("frame address {:?} is not page-aligned", addr);
            panic!("unaligned frame address: {:?}", addr);
        }
        let frame = addr
            .as_usize()
            .checked_sub(self.base.as_usize())
            .map(|offset| offset >> PAGE_SHIFT)
            .filter(|&frame| frame < self.total_frames);
        match frame {
            Some(frame) => frame,
            None => {
                log::error!("frame {:?} is outside the managed pool", addr);
                panic!("frame outside managed range: {:?}", addr);
            }
        }
    }

    fn byte_range(&self, addr: PhysAddr) -> core::ops::Range<usize> {
        let start = self.index_of(addr) * PAGE_SIZE;
        start..start + PAGE_SIZE
    }
}

impl FrameAllocator for BitmapFrameAllocator {
    fn alloc(&mut self) -> Option<PhysAddr> {
        if self.free_count == 0 {
            return None;
        }

        // Linear search for a byte with at least one free bit
        let byte_idx = self.bitmap.iter().position(|&b| b != 0xFF)?;
        let frame = (0..8)
            .map(|bit| byte_idx * 8 + bit)
            .find(|&frame| !self.is_allocated(frame))?;

        self.set_bit(frame, true);
        self.free_count -= 1;

        // Zero the frame so no data leaks between processes
        let start = frame * PAGE_SIZE;
        self.memory[start..start + PAGE_SIZE].fill(0);

        Some(self.base.add(frame << PAGE_SHIFT))
    }

    fn free(&mut self, addr: PhysAddr) {
        let frame = self.index_of(addr);

        if !self.is_allocated(frame) {
            log::error!("double free of frame {:?}", addr);
            panic!("Double free detected for frame: {:?}", addr);
        }

        self.set_bit(frame, false);
        self.free_count += 1;
    }

    fn frame(&self, addr: PhysAddr) -> &[u8] {
        let range = self.byte_range(addr);
        &self.memory[range]
    }

    fn frame_mut(&mut self, addr: PhysAddr) -> &mut [u8] {
        let range = self.byte_range(addr);
        &mut self.memory[range]
    }

    fn free_frames(&self) -> usize {
        self.free_count
    }
}
