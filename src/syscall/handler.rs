//! System Call Handler
//!
//! Decodes the request in the current process's trap frame, routes it to
//! the matching `sys_*` handler and writes the result back.
//!
//! # Dispatch Sequence
//! 1. Advance `sepc` past the `ecall` so the caller resumes after it.
//! 2. Decode the identifier. Unknown identifiers return -1 and are not
//!    counted anywhere.
//! 3. Count the invocation in the caller's per-identifier table.
//! 4. Run the handler with the raw argument words.
//! 5. Write the result to the caller's `a0`. A handler error becomes -1.
//!
//! The write in step 5 always targets the process that trapped, even when
//! the handler switched to another one.

use crate::error::SysResult;
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{FrameAllocator, VirtAddr};
use crate::task::Slot;
use crate::trap::ECALL_SIZE;

use super::numbers::Syscall;

/// What a dispatched request did to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// The value was stored in the caller's return register.
    Returned(isize),
    /// The caller issues the same request again the next time it runs.
    Restart,
    /// The caller's program was replaced; its registers start afresh.
    Replaced,
    /// The caller terminated.
    Exited,
}

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    /// Serve the system call trapped by the current process.
    ///
    /// Returns `None` when no process is running. Afterwards the trap-return
    /// path resumes whichever process [`Kernel::current_pid`] names, which
    /// may differ from the caller.
    pub fn handle_syscall(&mut self) -> Option<SyscallOutcome> {
        let slot = self.procs.current()?;
        let pcb = self.procs.get_mut(slot)?;
        let pid = pcb.pid();
        pcb.trap_frame.sepc += ECALL_SIZE;
        let id = pcb.trap_frame.syscall_id();
        let args = pcb.trap_frame.syscall_args();

        let Some(call) = Syscall::from_id(id) else {
            log::warn!("pid {}: unknown syscall {}", pid, id);
            pcb.trap_frame.set_return(-1);
            return Some(SyscallOutcome::Returned(-1));
        };
        pcb.count_syscall(id);
        log::trace!("pid {}: {:?} {:x?}", pid, call, args);

        let outcome = self.dispatch(call, args).unwrap_or_else(|err| {
            log::warn!("pid {}: {:?} rejected: {}", pid, call, err);
            SyscallOutcome::Returned(-1)
        });
        log::trace!("pid {}: {:?} -> {:?}", pid, call, outcome);
        self.complete(slot, outcome);
        Some(outcome)
    }

    fn dispatch(&mut self, call: Syscall, args: [usize; 6]) -> SysResult<SyscallOutcome> {
        use SyscallOutcome::Returned;

        match call {
            Syscall::Write => self.sys_write(args[0], VirtAddr::new(args[1]), args[2]).map(Returned),
            Syscall::Read => self.sys_read(args[0], VirtAddr::new(args[1]), args[2]).map(Returned),
            Syscall::Exit => Ok(self.sys_exit(args[0] as i32)),
            Syscall::SchedYield => self.sys_sched_yield().map(Returned),
            Syscall::GetTimeOfDay => self.sys_gettimeofday(VirtAddr::new(args[0])).map(Returned),
            Syscall::GetPid => self.sys_getpid().map(Returned),
            Syscall::GetPpid => self.sys_getppid().map(Returned),
            Syscall::Clone => self.sys_clone().map(Returned),
            Syscall::Execve => self.sys_execve(VirtAddr::new(args[0])),
            Syscall::Wait4 => self.sys_wait4(args[0] as isize, VirtAddr::new(args[1])),
            Syscall::Spawn => self.sys_spawn(VirtAddr::new(args[0])).map(Returned),
            Syscall::SetPriority => self.sys_set_priority(args[0] as isize).map(Returned),
            // The break delta is a C `int`.
            Syscall::Sbrk => self.sys_sbrk(args[0] as i32 as isize).map(Returned),
            Syscall::Mmap => self.sys_mmap(args[0], args[1], args[2]).map(Returned),
            Syscall::Munmap => self.sys_munmap(args[0], args[1]).map(Returned),
            Syscall::TaskInfo => self.sys_task_info(VirtAddr::new(args[0])).map(Returned),
        }
    }

    /// Apply `outcome` to the trap frame of the process in `slot`.
    fn complete(&mut self, slot: Slot, outcome: SyscallOutcome) {
        let Some(pcb) = self.procs.get_mut(slot) else {
            return;
        };
        match outcome {
            SyscallOutcome::Returned(value) => pcb.trap_frame.set_return(value),
            SyscallOutcome::Restart => pcb.trap_frame.sepc -= ECALL_SIZE,
            SyscallOutcome::Replaced | SyscallOutcome::Exited => {}
        }
    }
}
