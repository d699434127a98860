//! Page Table Entries and the Per-Process Page Table
//!
//! Entries use the RISC-V Sv39 leaf layout:
//!
//! ```text
//!  63      54 53                    10 9   8 7 6 5 4 3 2 1 0
//! ┌──────────┬────────────────────────┬─────┬─┬─┬─┬─┬─┬─┬─┬─┐
//! │ reserved │          PPN           │ RSW │D│A│G│U│X│W│R│V│
//! └──────────┴────────────────────────┴─────┴─┴─┴─┴─┴─┴─┴─┴─┘
//! ```
//!
//! The multi-level walk itself belongs to the platform; [`PageTable`] only
//! records the leaf entry installed for each user page, which is the whole
//! contract the address-space code relies on.
//!
//! # Security Properties
//! - Page flags are strictly typed to prevent invalid combinations
//! - A leaf is installed only over an invalid entry, never over a live one

use alloc::collections::BTreeMap;

use bitflags::bitflags;

use super::address::{PhysAddr, VirtPage};

bitflags! {
    /// Page table entry flags.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct PteFlags: u64 {
        /// Entry is valid.
        const V = 1 << 0;
        /// Readable.
        const R = 1 << 1;
        /// Writable.
        const W = 1 << 2;
        /// Executable.
        const X = 1 << 3;
        /// Accessible from user mode.
        const U = 1 << 4;
        /// Global mapping.
        const G = 1 << 5;
        /// Accessed.
        const A = 1 << 6;
        /// Dirty.
        const D = 1 << 7;

        /// Read/write/execute permission bits.
        const RWX = Self::R.bits() | Self::W.bits() | Self::X.bits();
        /// Fixed bits every user leaf carries.
        const USER_LEAF = Self::V.bits() | Self::U.bits();
    }
}

impl PteFlags {
    /// Leaf flags for a user page with the given permissions.
    ///
    /// Returns `None` if `perms` grants nothing or carries non-permission bits.
    #[inline]
    pub fn user_leaf(perms: PteFlags) -> Option<Self> {
        if perms.is_empty() || !PteFlags::RWX.contains(perms) {
            return None;
        }
        Some(perms | PteFlags::USER_LEAF)
    }
}

/// A single leaf page table entry.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    /// PPN field mask after shifting (44 bits).
    const PPN_MASK: u64 = (1 << 44) - 1;
    /// PPN field offset.
    const PPN_SHIFT: u32 = 10;
    /// Flag field mask.
    const FLAG_MASK: u64 = 0xFF;

    /// Create an invalid (empty) entry.
    #[inline]
    pub const fn invalid() -> Self {
        Self(0)
    }

    /// Create a page entry mapping a physical frame.
    #[inline]
    pub fn page(phys: PhysAddr, flags: PteFlags) -> Self {
        debug_assert!(phys.is_aligned());
        let ppn = phys.page_frame_number() as u64 & Self::PPN_MASK;
        Self((ppn << Self::PPN_SHIFT) | flags.bits())
    }

    /// Check if the entry is valid (present).
    #[inline]
    pub fn is_valid(self) -> bool {
        self.flags().contains(PteFlags::V)
    }

    /// Check if user mode may touch the page at all.
    #[inline]
    pub fn is_user(self) -> bool {
        self.flags().contains(PteFlags::USER_LEAF)
    }

    /// Check if the entry grants every permission in `perms` to user mode.
    #[inline]
    pub fn permits(self, perms: PteFlags) -> bool {
        self.is_user() && self.flags().contains(perms)
    }

    /// Get the physical address of the mapped frame.
    #[inline]
    pub fn addr(self) -> PhysAddr {
        PhysAddr::from_page_frame_number(((self.0 >> Self::PPN_SHIFT) & Self::PPN_MASK) as usize)
    }

    /// Get the flags from this entry.
    #[inline]
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0 & Self::FLAG_MASK)
    }

    /// Get the raw u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            write!(f, "PTE(addr={}, flags={:?})", self.addr(), self.flags())
        } else {
            write!(f, "PTE(invalid)")
        }
    }
}

/// Leaf entries of one address space, keyed by virtual page.
#[derive(Debug, Default)]
pub struct PageTable {
    entries: BTreeMap<VirtPage, PageTableEntry>,
}

impl PageTable {
    /// Create a new empty page table.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Install a leaf mapping `page` to `frame`.
    pub fn map(
        &mut self,
        page: VirtPage,
        frame: PhysAddr,
        flags: PteFlags,
    ) -> Result<(), MappingError> {
        if !frame.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if !flags.contains(PteFlags::V) {
            return Err(MappingError::InvalidPermissions);
        }
        if self.entry(page).is_some() {
            return Err(MappingError::AlreadyMapped);
        }
        self.entries.insert(page, PageTableEntry::page(frame, flags));
        Ok(())
    }

    /// Remove the leaf for `page`, returning the old entry.
    pub fn unmap(&mut self, page: VirtPage) -> Result<PageTableEntry, MappingError> {
        self.entries.remove(&page).ok_or(MappingError::NotMapped)
    }

    /// Look up the valid leaf for `page`.
    #[inline]
    pub fn entry(&self, page: VirtPage) -> Option<PageTableEntry> {
        self.entries.get(&page).copied().filter(|e| e.is_valid())
    }

    /// Iterate over all valid leaves in ascending page order.
    pub fn iter_valid(&self) -> impl Iterator<Item = (VirtPage, PageTableEntry)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_valid())
            .map(|(&page, &entry)| (page, entry))
    }

    /// Number of mapped pages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, yielding them so their frames can be released.
    pub fn drain(&mut self) -> impl Iterator<Item = (VirtPage, PageTableEntry)> {
        core::mem::take(&mut self.entries).into_iter()
    }
}

/// Error type for page mapping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// The virtual address is already mapped.
    AlreadyMapped,
    /// The virtual address is not mapped.
    NotMapped,
    /// No physical frames available.
    OutOfMemory,
    /// The address is not properly aligned.
    MisalignedAddress,
    /// Permission mask is empty or malformed.
    InvalidPermissions,
    /// The page is mapped but lacks the required permission.
    PermissionDenied,
    /// The range leaves the user half of the address space or wraps around.
    OutOfRange,
}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyMapped => write!(f, "virtual address already mapped"),
            Self::NotMapped => write!(f, "virtual address not mapped"),
            Self::OutOfMemory => write!(f, "out of physical frames"),
            Self::MisalignedAddress => write!(f, "address not properly aligned"),
            Self::InvalidPermissions => write!(f, "invalid permission combination"),
            Self::PermissionDenied => write!(f, "page lacks required permission"),
            Self::OutOfRange => write!(f, "range outside user address space"),
        }
    }
}
