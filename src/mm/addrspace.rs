//! Per-Process Address Spaces
//!
//! An [`AddressSpace`] owns one page table and every frame mapped through it.
//! All mutations are all-or-nothing: a range operation either applies to
//! every page or leaves the table exactly as it found it.
//!
//! Two kinds of user memory live here:
//! - explicit mappings made with [`AddressSpace::map`] (`mmap`)
//! - the heap, the pages between `heap_base` and the program break, grown and
//!   shrunk only by [`AddressSpace::grow_break`]
//!
//! The two never overlap: growing the break over an explicit mapping fails,
//! and explicit map/unmap refuse pages inside the heap.

use crate::config::USER_TOP;

use super::address::{page_range, pages_for, VirtAddr, VirtPage, PAGE_SIZE};
use super::frame::FrameAllocator;
use super::paging::{MappingError, PageTable, PteFlags};

/// Leaf flags of heap pages.
const HEAP_FLAGS: PteFlags = PteFlags::R
    .union(PteFlags::W)
    .union(PteFlags::USER_LEAF);

/// A user address space.
#[derive(Debug)]
pub struct AddressSpace {
    page_table: PageTable,
    /// Lowest heap address; fixed once the image is loaded.
    heap_base: VirtAddr,
    /// Current program break.
    brk: VirtAddr,
}

impl AddressSpace {
    /// Create an empty address space with the heap starting at `heap_base`.
    pub fn new(heap_base: VirtAddr) -> Self {
        debug_assert!(heap_base.is_aligned());
        Self {
            page_table: PageTable::new(),
            heap_base,
            brk: heap_base,
        }
    }

    /// The page table backing this space.
    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// Current program break.
    pub fn brk(&self) -> VirtAddr {
        self.brk
    }

    pub fn heap_base(&self) -> VirtAddr {
        self.heap_base
    }

    /// Number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        self.page_table.len()
    }

    /// Check whether `count` pages from `start` touch the heap region.
    pub fn overlaps_heap(&self, start: VirtPage, count: usize) -> bool {
        let heap_start = self.heap_base.page().number();
        let heap_end = heap_start + self.heap_pages();
        let end = start.number() + count;
        start.number() < heap_end && heap_start < end
    }

    /// Pages currently backing the heap.
    fn heap_pages(&self) -> usize {
        let used = self.brk.as_usize() - self.heap_base.as_usize();
        used.div_ceil(PAGE_SIZE)
    }

    /// Map `len` bytes at page-aligned `start` with the permissions in `perms`.
    ///
    /// Zero length succeeds without doing anything. On any failure the
    /// address space is left unchanged.
    pub fn map<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        start: VirtAddr,
        len: usize,
        perms: PteFlags,
    ) -> Result<(), MappingError> {
        let flags = PteFlags::user_leaf(perms).ok_or(MappingError::InvalidPermissions)?;
        if !start.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if len == 0 {
            return Ok(());
        }
        let count = user_page_count(start, len)?;
        if self.overlaps_heap(start.page(), count) {
            return Err(MappingError::AlreadyMapped);
        }
        self.map_pages(frames, start.page(), count, flags)
    }

    /// Unmap `len` bytes at page-aligned `start`, releasing their frames.
    ///
    /// Every covered page must be mapped; the whole range is checked before
    /// the first page is released.
    pub fn unmap<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        start: VirtAddr,
        len: usize,
    ) -> Result<(), MappingError> {
        if !start.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if len == 0 {
            return Ok(());
        }
        let count = user_page_count(start, len)?;
        if self.overlaps_heap(start.page(), count) {
            return Err(MappingError::PermissionDenied);
        }
        if page_range(start.page(), count).any(|page| self.page_table.entry(page).is_none()) {
            return Err(MappingError::NotMapped);
        }
        self.unmap_pages(frames, start.page(), count);
        Ok(())
    }

    /// Move the program break by `delta` bytes and return the previous break.
    ///
    /// Growth maps fresh zeroed pages, shrinking releases them. If growth
    /// cannot be satisfied the break and the mappings stay as they were.
    pub fn grow_break<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        delta: isize,
    ) -> Result<VirtAddr, MappingError> {
        let old = self.brk;
        let new = old
            .as_usize()
            .checked_add_signed(delta)
            .map(VirtAddr::new)
            .filter(|&new| new >= self.heap_base && new.as_usize() <= USER_TOP)
            .ok_or(MappingError::OutOfRange)?;

        let old_pages = self.heap_pages();
        let new_pages = (new.as_usize() - self.heap_base.as_usize()).div_ceil(PAGE_SIZE);
        let first_page = self.heap_base.page();

        if new_pages > old_pages {
            let start = VirtPage::from_number(first_page.number() + old_pages);
            self.map_pages(frames, start, new_pages - old_pages, HEAP_FLAGS)?;
        } else if new_pages < old_pages {
            let start = VirtPage::from_number(first_page.number() + new_pages);
            self.unmap_pages(frames, start, old_pages - new_pages);
        }

        self.brk = new;
        log::trace!("brk {} -> {}", old, new);
        Ok(old)
    }

    /// Build an independent copy of this space: every mapped page gets a fresh
    /// frame with the same contents and flags.
    pub fn duplicate<A: FrameAllocator + ?Sized>(
        &self,
        frames: &mut A,
    ) -> Result<Self, MappingError> {
        let mut copy = Self {
            page_table: PageTable::new(),
            heap_base: self.heap_base,
            brk: self.brk,
        };
        let mut buf = [0u8; PAGE_SIZE];

        for (page, entry) in self.page_table.iter_valid() {
            let Some(frame) = frames.alloc() else {
                copy.release(frames);
                return Err(MappingError::OutOfMemory);
            };
            buf.copy_from_slice(frames.frame(entry.addr()));
            frames.frame_mut(frame).copy_from_slice(&buf);
            if let Err(err) = copy.page_table.map(page, frame, entry.flags()) {
                frames.free(frame);
                copy.release(frames);
                return Err(err);
            }
        }
        Ok(copy)
    }

    /// Unmap everything and return all frames to the allocator.
    pub fn release<A: FrameAllocator + ?Sized>(&mut self, frames: &mut A) {
        for (_, entry) in self.page_table.drain() {
            frames.free(entry.addr());
        }
        self.brk = self.heap_base;
    }

    /// Map `count` fresh pages from `start`, rolling back on failure.
    pub(crate) fn map_pages<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        start: VirtPage,
        count: usize,
        flags: PteFlags,
    ) -> Result<(), MappingError> {
        if page_range(start, count).any(|page| self.page_table.entry(page).is_some()) {
            return Err(MappingError::AlreadyMapped);
        }

        for (done, page) in page_range(start, count).enumerate() {
            let result = match frames.alloc() {
                Some(frame) => self.page_table.map(page, frame, flags).map_err(|err| {
                    frames.free(frame);
                    err
                }),
                None => Err(MappingError::OutOfMemory),
            };
            if let Err(err) = result {
                log::debug!("mapping {} pages at {:?} failed after {}: {}", count, start, done, err);
                self.unmap_pages(frames, start, done);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Unmap `count` pages known to be mapped.
    ///
    /// # Panics
    /// Panics if one of them is missing: callers have already checked, so an
    /// absent entry means the page table and its owner disagree.
    fn unmap_pages<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        start: VirtPage,
        count: usize,
    ) {
        for page in page_range(start, count) {
            match self.page_table.unmap(page) {
                Ok(entry) => frames.free(entry.addr()),
                Err(_) => {
                    log::error!("page {:?} expected mapped but has no entry", page.start());
                    panic!("page table inconsistent at {:?}", page.start());
                }
            }
        }
    }
}

/// Page count of a user range, rejecting ranges that leave user space.
fn user_page_count(start: VirtAddr, len: usize) -> Result<usize, MappingError> {
    let count = pages_for(len).ok_or(MappingError::OutOfRange)?;
    let end = start
        .checked_add(count * PAGE_SIZE)
        .ok_or(MappingError::OutOfRange)?;
    if !start.is_user() || end.as_usize() > USER_TOP {
        return Err(MappingError::OutOfRange);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::address::PhysAddr;
    use crate::mm::frame::BitmapFrameAllocator;

    const HEAP: VirtAddr = VirtAddr::new(0x10_0000);
    const RW: PteFlags = PteFlags::R.union(PteFlags::W);

    fn pool(frames: usize) -> BitmapFrameAllocator {
        BitmapFrameAllocator::new(PhysAddr::new(0x8040_0000), frames)
    }

    #[test]
    fn test_map_then_unmap_round_trip() {
        let mut frames = pool(16);
        let mut space = AddressSpace::new(HEAP);
        let start = VirtAddr::new(0x2000_0000);

        space.map(&mut frames, start, 3 * PAGE_SIZE, RW).unwrap();
        for i in 0..3 {
            assert!(space.translate(VirtAddr::new(start.as_usize() + i * PAGE_SIZE + 8)).is_some());
        }
        assert_eq!(frames.free_frames(), 13);

        space.unmap(&mut frames, start, 3 * PAGE_SIZE).unwrap();
        for i in 0..3 {
            assert!(space.translate(VirtAddr::new(start.as_usize() + i * PAGE_SIZE)).is_none());
        }
        assert_eq!(frames.free_frames(), 16);
    }

    #[test]
    fn test_map_rolls_back_when_frames_run_out() {
        let mut frames = pool(2);
        let mut space = AddressSpace::new(HEAP);
        let start = VirtAddr::new(0x2000_0000);

        assert_eq!(
            space.map(&mut frames, start, 4 * PAGE_SIZE, RW),
            Err(MappingError::OutOfMemory)
        );
        for i in 0..4 {
            assert!(space.translate(VirtAddr::new(start.as_usize() + i * PAGE_SIZE)).is_none());
        }
        assert_eq!(frames.free_frames(), 2);
        assert_eq!(space.mapped_pages(), 0);
    }

    #[test]
    fn test_map_validation() {
        let mut frames = pool(4);
        let mut space = AddressSpace::new(HEAP);
        let start = VirtAddr::new(0x2000_0000);

        assert_eq!(
            space.map(&mut frames, VirtAddr::new(0x2000_0010), PAGE_SIZE, RW),
            Err(MappingError::MisalignedAddress)
        );
        assert_eq!(
            space.map(&mut frames, start, PAGE_SIZE, PteFlags::empty()),
            Err(MappingError::InvalidPermissions)
        );
        assert_eq!(space.map(&mut frames, start, 0, RW), Ok(()));
        assert_eq!(space.mapped_pages(), 0);

        space.map(&mut frames, start, PAGE_SIZE, RW).unwrap();
        assert_eq!(
            space.map(&mut frames, start.align_down(), 2 * PAGE_SIZE, RW),
            Err(MappingError::AlreadyMapped)
        );
        assert_eq!(space.mapped_pages(), 1);
        assert_eq!(frames.free_frames(), 3);
    }

    #[test]
    fn test_unmap_is_checked_before_release() {
        let mut frames = pool(4);
        let mut space = AddressSpace::new(HEAP);
        let start = VirtAddr::new(0x2000_0000);
        space.map(&mut frames, start, PAGE_SIZE, RW).unwrap();

        assert_eq!(
            space.unmap(&mut frames, start, 2 * PAGE_SIZE),
            Err(MappingError::NotMapped)
        );
        assert!(space.translate(start).is_some());
        assert_eq!(space.unmap(&mut frames, start, 0), Ok(()));
        assert_eq!(
            space.unmap(&mut frames, VirtAddr::new(0x2000_0001), PAGE_SIZE),
            Err(MappingError::MisalignedAddress)
        );
    }

    #[test]
    fn test_grow_break_is_reversible() {
        let mut frames = pool(8);
        let mut space = AddressSpace::new(HEAP);

        assert_eq!(space.grow_break(&mut frames, 100), Ok(HEAP));
        assert_eq!(
            space.grow_break(&mut frames, PAGE_SIZE as isize),
            Ok(VirtAddr::new(HEAP.as_usize() + 100))
        );
        assert_eq!(space.mapped_pages(), 2);

        let top = space.brk();
        assert_eq!(space.grow_break(&mut frames, -(PAGE_SIZE as isize)), Ok(top));
        assert_eq!(space.grow_break(&mut frames, -100), Ok(VirtAddr::new(HEAP.as_usize() + 100)));
        assert_eq!(space.brk(), HEAP);
        assert_eq!(space.mapped_pages(), 0);
        assert_eq!(frames.free_frames(), 8);
        assert!(space.translate(HEAP).is_none());
    }

    #[test]
    fn test_grow_break_failure_leaves_break() {
        let mut frames = pool(1);
        let mut space = AddressSpace::new(HEAP);

        assert_eq!(
            space.grow_break(&mut frames, 2 * PAGE_SIZE as isize),
            Err(MappingError::OutOfMemory)
        );
        assert_eq!(space.brk(), HEAP);
        assert_eq!(frames.free_frames(), 1);
        assert_eq!(space.grow_break(&mut frames, -1), Err(MappingError::OutOfRange));
    }

    #[test]
    fn test_heap_and_explicit_mappings_stay_disjoint() {
        let mut frames = pool(8);
        let mut space = AddressSpace::new(HEAP);
        space.grow_break(&mut frames, PAGE_SIZE as isize).unwrap();

        assert_eq!(space.map(&mut frames, HEAP, PAGE_SIZE, RW), Err(MappingError::AlreadyMapped));
        assert_eq!(space.unmap(&mut frames, HEAP, PAGE_SIZE), Err(MappingError::PermissionDenied));

        let above = VirtAddr::new(HEAP.as_usize() + PAGE_SIZE);
        space.map(&mut frames, above, PAGE_SIZE, RW).unwrap();
        assert_eq!(
            space.grow_break(&mut frames, PAGE_SIZE as isize),
            Err(MappingError::AlreadyMapped)
        );
        assert_eq!(space.brk().as_usize(), HEAP.as_usize() + PAGE_SIZE);
    }

    #[test]
    fn test_duplicate_copies_contents() {
        let mut frames = pool(8);
        let mut space = AddressSpace::new(HEAP);
        let start = VirtAddr::new(0x2000_0000);
        space.map(&mut frames, start, PAGE_SIZE, RW).unwrap();
        space.copy_out(&mut frames, start, b"parent").unwrap();

        let mut child = space.duplicate(&mut frames).unwrap();
        child.copy_out(&mut frames, start, b"child!").unwrap();

        let mut buf = [0u8; 6];
        space.copy_in(&frames, &mut buf, start).unwrap();
        assert_eq!(&buf, b"parent");
        child.copy_in(&frames, &mut buf, start).unwrap();
        assert_eq!(&buf, b"child!");
        assert_ne!(space.translate(start), child.translate(start));

        child.release(&mut frames);
        space.release(&mut frames);
        assert_eq!(frames.free_frames(), 8);
    }

    #[test]
    fn test_duplicate_out_of_memory_leaves_nothing() {
        let mut frames = pool(3);
        let mut space = AddressSpace::new(HEAP);
        space.map(&mut frames, VirtAddr::new(0x2000_0000), 2 * PAGE_SIZE, RW).unwrap();

        assert_eq!(space.duplicate(&mut frames).err(), Some(MappingError::OutOfMemory));
        assert_eq!(frames.free_frames(), 1);
    }
}
