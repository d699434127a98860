//! System Call Errors
//!
//! Handlers return [`SysResult`] and propagate with `?`. The dispatcher is
//! the only place an error becomes a user-visible value, and user space only
//! ever sees `-1`; the variant survives as far as the kernel log.

use core::fmt;

use crate::mm::MappingError;

/// Why a system call failed.
///
/// Discriminants are the matching Linux errno values, used in log lines.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysError {
    /// Invalid argument (bad length, mask, priority)
    InvalidArgument = 22,
    /// Address not page-aligned
    BadAlignment = 75,
    /// Mapping exists but lacks the needed permission
    BadPermissions = 13,
    /// User pointer not mapped (fault)
    BadAddress = 14,
    /// Range already mapped
    AddressInUse = 17,
    /// No free physical frame
    OutOfMemory = 12,
    /// No free process slot
    TooManyProcesses = 11,
    /// No child matches a wait request
    NoSuchChild = 10,
    /// Program name not known to the loader
    NotFound = 2,
    /// File descriptor not supported for the operation
    BadFd = 9,
}

impl SysError {
    /// The errno value for this error.
    #[inline]
    pub const fn errno(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidArgument => "invalid argument",
            Self::BadAlignment => "misaligned address",
            Self::BadPermissions => "permission denied",
            Self::BadAddress => "bad user address",
            Self::AddressInUse => "address range in use",
            Self::OutOfMemory => "out of memory",
            Self::TooManyProcesses => "process table full",
            Self::NoSuchChild => "no such child",
            Self::NotFound => "program not found",
            Self::BadFd => "bad file descriptor",
        };
        write!(f, "{} (errno {})", msg, self.errno())
    }
}

impl From<MappingError> for SysError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::AlreadyMapped => Self::AddressInUse,
            MappingError::NotMapped => Self::BadAddress,
            MappingError::OutOfMemory => Self::OutOfMemory,
            MappingError::MisalignedAddress => Self::BadAlignment,
            MappingError::InvalidPermissions => Self::InvalidArgument,
            MappingError::PermissionDenied => Self::BadPermissions,
            MappingError::OutOfRange => Self::BadAddress,
        }
    }
}

/// Result type of every system call handler.
pub type SysResult<T> = Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_errors_map_to_taxonomy() {
        assert_eq!(SysError::from(MappingError::NotMapped), SysError::BadAddress);
        assert_eq!(SysError::from(MappingError::OutOfMemory), SysError::OutOfMemory);
        assert_eq!(SysError::from(MappingError::MisalignedAddress), SysError::BadAlignment);
    }

    #[test]
    fn test_display_carries_errno() {
        assert_eq!(SysError::BadFd.to_string(), "bad file descriptor (errno 9)");
    }
}
