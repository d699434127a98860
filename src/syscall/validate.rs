//! System Call Input Validation
//!
//! Raw argument words are turned into typed values here before any handler
//! touches an address space.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Buffer overflows (bounds checking)
//!   - Integer wrap-around (checked arithmetic)
//!   - Null pointer dereference (page 0 is never user memory)

use crate::config::{USER_BASE, USER_TOP};
use crate::error::{SysError, SysResult};
use crate::mm::{PteFlags, VirtAddr};

/// Standard input descriptor.
pub const STDIN: usize = 0;
/// Standard output descriptor.
pub const STDOUT: usize = 1;

/// A page-aligned, non-empty range inside user space.
///
/// # Safety
/// Only constructed by [`validate_user_range`], so holding one proves the
/// range neither wraps nor leaves `[USER_BASE, USER_TOP)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRange {
    start: VirtAddr,
    len: usize,
}

impl UserRange {
    pub fn start(&self) -> VirtAddr {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Validate a page-aligned user range for `mmap`/`munmap`.
///
/// # Security Checks
/// 1. Start is page-aligned
/// 2. Start is within user space (rejects null)
/// 3. Start + length doesn't overflow
/// 4. End is within user space
pub fn validate_user_range(start: usize, len: usize) -> SysResult<UserRange> {
    let start = VirtAddr::new(start);
    if !start.is_aligned() {
        return Err(SysError::BadAlignment);
    }

    if start.as_usize() < USER_BASE || start.as_usize() >= USER_TOP {
        return Err(SysError::BadAddress);
    }

    let end = start.as_usize().checked_add(len).ok_or(SysError::BadAddress)?;
    if end > USER_TOP {
        return Err(SysError::BadAddress);
    }

    Ok(UserRange { start, len })
}

/// Decode `mmap` protection bits: bit0 read, bit1 write, bit2 execute.
///
/// At least one bit must be set and no higher bit may be.
pub fn validate_port(port: usize) -> SysResult<PteFlags> {
    if port & !0x7 != 0 || port & 0x7 == 0 {
        return Err(SysError::InvalidArgument);
    }
    let mut perms = PteFlags::empty();
    if port & 0x1 != 0 {
        perms |= PteFlags::R;
    }
    if port & 0x2 != 0 {
        perms |= PteFlags::W;
    }
    if port & 0x4 != 0 {
        perms |= PteFlags::X;
    }
    Ok(perms)
}
