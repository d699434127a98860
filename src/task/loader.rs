//! Program Image Loader
//!
//! Lays a flat binary image out in a fresh address space:
//!
//! ```text
//! USER_BASE ─► ┌───────────────┐
//!              │ image (R W X) │
//!              ├───────────────┤
//!              │  guard page   │  unmapped
//!              ├───────────────┤
//!              │ stack (R W)   │  USER_STACK_SIZE
//!   heap_base ►├───────────────┤ ◄─ initial sp
//!              │ heap (sbrk)   │
//!              └───────────────┘
//! ```

use crate::config::{USER_BASE, USER_STACK_SIZE};
use crate::mm::{
    pages_for, AddressSpace, FrameAllocator, MappingError, PteFlags, VirtAddr, PAGE_SIZE,
};

/// Where a loaded program starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: usize,
    pub user_sp: usize,
}

/// Build a new address space holding `image`.
///
/// On failure every frame taken so far is returned and nothing is left behind.
pub fn load_image<A: FrameAllocator + ?Sized>(
    frames: &mut A,
    image: &[u8],
) -> Result<(AddressSpace, LoadedImage), MappingError> {
    let image_pages = pages_for(image.len()).ok_or(MappingError::OutOfRange)?;
    let stack_bottom = USER_BASE + (image_pages + 1) * PAGE_SIZE;
    let stack_top = stack_bottom + USER_STACK_SIZE;

    let mut space = AddressSpace::new(VirtAddr::new(stack_top));
    if let Err(err) = populate(&mut space, frames, image, stack_bottom) {
        space.release(frames);
        return Err(err);
    }

    log::debug!(
        "loaded {} byte image: entry {:#x}, sp {:#x}",
        image.len(),
        USER_BASE,
        stack_top
    );
    Ok((
        space,
        LoadedImage {
            entry: USER_BASE,
            user_sp: stack_top,
        },
    ))
}

fn populate<A: FrameAllocator + ?Sized>(
    space: &mut AddressSpace,
    frames: &mut A,
    image: &[u8],
    stack_bottom: usize,
) -> Result<(), MappingError> {
    let text = VirtAddr::new(USER_BASE);
    space.map(frames, text, image.len(), PteFlags::RWX)?;
    space.copy_out(frames, text, image)?;
    space.map(
        frames,
        VirtAddr::new(stack_bottom),
        USER_STACK_SIZE,
        PteFlags::R | PteFlags::W,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::{BitmapFrameAllocator, PhysAddr};

    #[test]
    fn test_layout() {
        let mut frames = BitmapFrameAllocator::new(PhysAddr::new(0x8040_0000), 8);
        let image = [0x13u8; PAGE_SIZE + 10];
        let (space, loaded) = load_image(&mut frames, &image).unwrap();

        assert_eq!(loaded.entry, USER_BASE);
        // two image pages, one guard page, then the stack
        let stack_bottom = USER_BASE + 3 * PAGE_SIZE;
        assert_eq!(loaded.user_sp, stack_bottom + USER_STACK_SIZE);
        assert_eq!(space.heap_base().as_usize(), loaded.user_sp);
        assert!(space.translate(VirtAddr::new(USER_BASE + 2 * PAGE_SIZE)).is_none());
        assert!(space.translate(VirtAddr::new(stack_bottom)).is_some());

        let mut byte = [0u8; 1];
        space.copy_in(&frames, &mut byte, VirtAddr::new(USER_BASE + PAGE_SIZE + 9)).unwrap();
        assert_eq!(byte, [0x13]);
    }

    #[test]
    fn test_failure_returns_frames() {
        let mut frames = BitmapFrameAllocator::new(PhysAddr::new(0x8040_0000), 2);
        let image = [0u8; PAGE_SIZE];
        assert_eq!(load_image(&mut frames, &image).err(), Some(MappingError::OutOfMemory));
        assert_eq!(frames.free_frames(), 2);
    }
}
