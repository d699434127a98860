//! Memory management
//!
//! Provides:
//! - Typed physical/virtual addresses
//! - The physical frame allocator seam and a bitmap implementation
//! - Per-process page tables and address spaces
//! - Safe copies across the user/kernel boundary
//! - The kernel heap (bare-metal builds only)
//!
//! # Security Principles
//! - All user ranges are bounds-checked with checked arithmetic
//! - Frames are zeroed before they are handed out
//! - Address-space mutations are all-or-nothing

mod address;
mod addrspace;
mod frame;
#[cfg(feature = "kernel-heap")]
mod heap;
mod paging;
mod uaccess;

pub use address::{pages_for, PhysAddr, VirtAddr, VirtPage, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
pub use addrspace::AddressSpace;
pub use frame::{BitmapFrameAllocator, FrameAllocator};
#[cfg(feature = "kernel-heap")]
pub use heap::{heap_free, heap_size, init_heap};
pub use paging::{MappingError, PageTable, PageTableEntry, PteFlags};
