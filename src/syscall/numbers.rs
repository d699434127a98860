//! System call numbers
//!
//! Linux RISC-V numbering where a Linux call exists; `spawn` and
//! `task_info` use private numbers above the Linux range.

pub const SYS_READ: usize = 63;
pub const SYS_WRITE: usize = 64;
pub const SYS_EXIT: usize = 93;
pub const SYS_SCHED_YIELD: usize = 124;
pub const SYS_SETPRIORITY: usize = 140;
pub const SYS_GETTIMEOFDAY: usize = 169;
pub const SYS_GETPID: usize = 172;
pub const SYS_GETPPID: usize = 173;
pub const SYS_MUNMAP: usize = 215;
pub const SYS_SBRK: usize = 214;
pub const SYS_CLONE: usize = 220;
pub const SYS_EXECVE: usize = 221;
pub const SYS_MMAP: usize = 222;
pub const SYS_WAIT4: usize = 260;
pub const SYS_SPAWN: usize = 400;
pub const SYS_TASK_INFO: usize = 410;

/// The enumerated system calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    Exit,
    SchedYield,
    SetPriority,
    GetTimeOfDay,
    GetPid,
    GetPpid,
    Munmap,
    Sbrk,
    Clone,
    Execve,
    Mmap,
    Wait4,
    Spawn,
    TaskInfo,
}

impl Syscall {
    /// Decode a request identifier; `None` for anything not in the table.
    pub const fn from_id(id: usize) -> Option<Self> {
        Some(match id {
            SYS_READ => Self::Read,
            SYS_WRITE => Self::Write,
            SYS_EXIT => Self::Exit,
            SYS_SCHED_YIELD => Self::SchedYield,
            SYS_SETPRIORITY => Self::SetPriority,
            SYS_GETTIMEOFDAY => Self::GetTimeOfDay,
            SYS_GETPID => Self::GetPid,
            SYS_GETPPID => Self::GetPpid,
            SYS_MUNMAP => Self::Munmap,
            SYS_SBRK => Self::Sbrk,
            SYS_CLONE => Self::Clone,
            SYS_EXECVE => Self::Execve,
            SYS_MMAP => Self::Mmap,
            SYS_WAIT4 => Self::Wait4,
            SYS_SPAWN => Self::Spawn,
            SYS_TASK_INFO => Self::TaskInfo,
            _ => return None,
        })
    }

    /// The request identifier.
    pub const fn id(self) -> usize {
        match self {
            Self::Read => SYS_READ,
            Self::Write => SYS_WRITE,
            Self::Exit => SYS_EXIT,
            Self::SchedYield => SYS_SCHED_YIELD,
            Self::SetPriority => SYS_SETPRIORITY,
            Self::GetTimeOfDay => SYS_GETTIMEOFDAY,
            Self::GetPid => SYS_GETPID,
            Self::GetPpid => SYS_GETPPID,
            Self::Munmap => SYS_MUNMAP,
            Self::Sbrk => SYS_SBRK,
            Self::Clone => SYS_CLONE,
            Self::Execve => SYS_EXECVE,
            Self::Mmap => SYS_MMAP,
            Self::Wait4 => SYS_WAIT4,
            Self::Spawn => SYS_SPAWN,
            Self::TaskInfo => SYS_TASK_INFO,
        }
    }
}
