//! System Call Interface
//!
//! User programs request kernel services with `ecall`, putting the request
//! identifier in `a7` and up to six arguments in `a0`..`a5`. The result
//! comes back in `a0`; every failure is reported as -1.
//!
//! # Security Model
//! - Whitelist approach: only identifiers in [`Syscall`] are served
//! - All user pointers go through the caller's page table, never dereferenced
//!   directly
//! - Invalid inputs return -1, never panic
//!
//! # Calls
//! | id  | call          | arguments                        |
//! |-----|---------------|----------------------------------|
//! | 63  | read          | fd, buf, len                     |
//! | 64  | write         | fd, buf, len                     |
//! | 93  | exit          | code                             |
//! | 124 | sched_yield   |                                  |
//! | 140 | set_priority  | priority                         |
//! | 169 | gettimeofday  | tv, tz                           |
//! | 172 | getpid        |                                  |
//! | 173 | getppid       |                                  |
//! | 214 | sbrk          | delta                            |
//! | 215 | munmap        | start, len                       |
//! | 220 | clone         |                                  |
//! | 221 | execve        | path                             |
//! | 222 | mmap          | start, len, port, flags, fd      |
//! | 260 | wait4         | pid, status                      |
//! | 400 | spawn         | path                             |
//! | 410 | task_info     | ti                               |

mod fs;
mod handler;
mod memory;
pub mod numbers;
mod process;
mod time;
mod validate;

pub use handler::SyscallOutcome;
pub use numbers::Syscall;
pub use process::{TaskInfo, TaskStatus};
pub use time::TimeVal;
pub use validate::{validate_port, validate_user_range, UserRange, STDIN, STDOUT};
