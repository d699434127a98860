//! Physical and Virtual Address Types
//!
//! Type-safe wrappers for memory addresses that prevent mixing
//! physical and virtual addresses at compile time.
//!
//! # Security Properties
//! - Physical addresses are never dereferenced; frame contents are reached
//!   only through the [`FrameAllocator`](super::frame::FrameAllocator)
//! - User-supplied virtual addresses go through checked arithmetic, so a
//!   hostile length can never wrap around the address space

use core::fmt;

use crate::config::{USER_BASE, USER_TOP};

pub use crate::config::PAGE_SIZE;

/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: usize = 12;

/// A physical memory address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(usize);

impl PhysAddr {
    /// Create a new physical address.
    ///
    /// # Panics
    /// Panics in debug mode if the address uses more than 56 bits (Sv39 PA width).
    #[inline]
    pub const fn new(addr: usize) -> Self {
        debug_assert!(addr <= 0x00FF_FFFF_FFFF_FFFF);
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the page frame number.
    #[inline]
    pub const fn page_frame_number(self) -> usize {
        self.0 >> PAGE_SHIFT
    }

    /// Create from a page frame number.
    #[inline]
    pub const fn from_page_frame_number(pfn: usize) -> Self {
        Self(pfn << PAGE_SHIFT)
    }

    /// Get the offset within the page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Add an offset to this address.
    #[inline]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A user virtual address, exactly as handed over by a trap.
///
/// No canonicalization happens here: the value is whatever user space put in a
/// register, and range checks are the caller's job (see [`VirtAddr::is_user`]).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Get the virtual page containing this address.
    #[inline]
    pub const fn page(self) -> VirtPage {
        VirtPage(self.0 >> PAGE_SHIFT)
    }

    /// Add an offset to this address, or `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Check if this address lies in the user half of the address space.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 >= USER_BASE && self.0 < USER_TOP
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A virtual page number; the key of every page table lookup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct VirtPage(usize);

impl VirtPage {
    #[inline]
    pub const fn from_number(vpn: usize) -> Self {
        Self(vpn)
    }

    #[inline]
    pub const fn number(self) -> usize {
        self.0
    }

    /// First address of the page.
    #[inline]
    pub const fn start(self) -> VirtAddr {
        VirtAddr(self.0 << PAGE_SHIFT)
    }

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Iterate over the pages `[start, start + count)`.
pub fn page_range(start: VirtPage, count: usize) -> impl Iterator<Item = VirtPage> {
    (start.number()..start.number() + count).map(VirtPage::from_number)
}

/// Number of pages needed to cover `len` bytes, or `None` on overflow.
#[inline]
pub const fn pages_for(len: usize) -> Option<usize> {
    match len.checked_add(PAGE_MASK) {
        Some(v) => Some(v >> PAGE_SHIFT),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_range() {
        assert!(VirtAddr::new(USER_BASE).is_user());
        assert!(!VirtAddr::new(0).is_user());
        assert!(!VirtAddr::new(USER_TOP).is_user());
    }

    #[test]
    fn test_page_alignment() {
        let addr = VirtAddr::new(0x4008_1234);
        assert!(!addr.is_aligned());
        assert_eq!(addr.align_down().as_usize(), 0x4008_1000);
    }

    #[test]
    fn test_pages_for() {
        assert_eq!(pages_for(0), Some(0));
        assert_eq!(pages_for(1), Some(1));
        assert_eq!(pages_for(PAGE_SIZE), Some(1));
        assert_eq!(pages_for(PAGE_SIZE + 1), Some(2));
        assert_eq!(pages_for(usize::MAX), None);
    }
}
