//! Kernel Heap Allocator
//!
//! Uses `linked_list_allocator` for heap management. Only compiled into
//! bare-metal images (`kernel-heap` feature); hosted builds and tests use the
//! standard allocator.
//!
//! # Security Considerations
//! - Heap is initialized once during boot
//! - All allocations go through Rust's global allocator
//! - linked_list_allocator provides bounds checking

use linked_list_allocator::LockedHeap;

/// Global heap allocator instance
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Heap size: page tables, process control blocks and syscall scratch
/// buffers all live here.
const HEAP_SIZE: usize = 512 * 1024;

/// Static heap memory region
static mut HEAP_MEMORY: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

/// Initialize the kernel heap
///
/// # Safety
/// Must be called exactly once during kernel initialization, before any
/// heap allocation (including the first [`crate::Kernel::new`]).
pub unsafe fn init_heap() {
    // SAFETY:
    // - HEAP_MEMORY is a valid static array
    // - The caller guarantees this runs once, before any allocation
    // - No other code accesses HEAP_MEMORY directly
    unsafe {
        let heap_start = (&raw mut HEAP_MEMORY).cast::<u8>();
        ALLOCATOR.lock().init(heap_start, HEAP_SIZE);
    }
    log::info!("kernel heap: {} KiB", HEAP_SIZE / 1024);
}

/// Get the size of the kernel heap
pub fn heap_size() -> usize {
    HEAP_SIZE
}

/// Bytes currently free in the kernel heap.
pub fn heap_free() -> usize {
    ALLOCATOR.lock().free()
}
