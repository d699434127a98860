//! minikernel - System-Call and Memory-Management Core
//!
//! The portable half of a small single-core multitasking kernel for RISC-V:
//! per-process address spaces, a process table with stride scheduling, and
//! the system-call dispatcher that user programs reach through `ecall`.
//!
//! # Architecture
//! - [`mm`]: frames, page tables, address spaces, user copies
//! - [`task`]: process control blocks, the run queue, lifecycle operations
//! - [`syscall`]: request decoding, accounting and the handlers
//! - [`Kernel`]: owns all of the above plus the [`hal::Platform`]
//!
//! The board crate provides the trap entry assembly, a [`mm::FrameAllocator`]
//! over real RAM and a [`hal::Platform`] for the console and timer, then calls
//! [`Kernel::handle_syscall`] on every environment call from user mode.
//!
//! # Security Features
//! - User memory is only reached through the caller's page table
//! - Every user range is checked before the first byte is copied
//! - Address-space changes are all-or-nothing
//! - Unknown requests are rejected without side effects

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod hal;
mod kernel;
pub mod logging;
pub mod mm;
pub mod syscall;
pub mod task;
pub mod trap;

#[cfg(test)]
mod test_support;

pub use config::KernelConfig;
pub use error::{SysError, SysResult};
pub use kernel::Kernel;
pub use syscall::SyscallOutcome;
