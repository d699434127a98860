//! Process system calls
//!
//! Lifecycle (`exit`, `clone`, `execve`, `spawn`, `wait4`), scheduling
//! (`sched_yield`, `set_priority`) and introspection (`getpid`, `getppid`,
//! `task_info`).

use alloc::vec::Vec;

use crate::config::{IDLE_PID, MAX_PATH_LEN, MAX_SYSCALL_NUM};
use crate::error::{SysError, SysResult};
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{FrameAllocator, VirtAddr};
use crate::task::{ProcessState, WaitStatus, WaitTarget};

use super::handler::SyscallOutcome;

/// Task status as reported by `task_info`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    UnInit = 0,
    Ready = 1,
    Running = 2,
    Exited = 3,
}

impl From<ProcessState> for TaskStatus {
    fn from(state: ProcessState) -> Self {
        match state {
            ProcessState::Unused => Self::UnInit,
            ProcessState::Runnable => Self::Ready,
            ProcessState::Running => Self::Running,
            ProcessState::Zombie => Self::Exited,
        }
    }
}

/// Snapshot returned by `task_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub status: TaskStatus,
    pub syscall_times: [u32; MAX_SYSCALL_NUM],
    /// Milliseconds since the process was created.
    pub time: u32,
}

impl TaskInfo {
    /// Size of the user-visible structure.
    pub const SIZE: usize = 4 + 4 * MAX_SYSCALL_NUM + 4;

    /// Little-endian `{ status: u32, syscall_times: [u32; N], time: u32 }`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&(self.status as u32).to_le_bytes());
        for count in &self.syscall_times {
            bytes.extend_from_slice(&count.to_le_bytes());
        }
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes
    }
}

/// Whole milliseconds between two cycle counter readings.
fn elapsed_ms(start: u64, now: u64, freq: u64) -> u32 {
    let ms = |cycles: u64| cycles as u128 * 1000 / freq as u128;
    u32::try_from(ms(now).saturating_sub(ms(start))).unwrap_or(u32::MAX)
}

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    pub(crate) fn sys_exit(&mut self, code: i32) -> SyscallOutcome {
        self.procs.exit(&mut self.frames, code);
        SyscallOutcome::Exited
    }

    pub(crate) fn sys_sched_yield(&mut self) -> SysResult<isize> {
        self.procs.yield_now();
        Ok(0)
    }

    pub(crate) fn sys_getpid(&mut self) -> SysResult<isize> {
        Ok(self.procs.caller_pcb()?.pid().0 as isize)
    }

    /// Parent pid, or the idle pid for processes nobody waits on.
    pub(crate) fn sys_getppid(&mut self) -> SysResult<isize> {
        let pcb = self.procs.caller_pcb()?;
        let ppid = pcb
            .parent()
            .and_then(|slot| self.procs.get(slot))
            .map_or(IDLE_PID, |parent| parent.pid().0);
        Ok(ppid as isize)
    }

    /// Fork. The parent gets the child's pid, the child gets 0.
    pub(crate) fn sys_clone(&mut self) -> SysResult<isize> {
        let now = self.platform.cycles();
        let pid = self.procs.fork(&mut self.frames, now)?;
        Ok(pid.0 as isize)
    }

    /// Replace the caller's program with the image named at `path`.
    pub(crate) fn sys_execve(&mut self, path: VirtAddr) -> SysResult<SyscallOutcome> {
        let mut buf = [0u8; MAX_PATH_LEN];
        let name = self.read_path(path, &mut buf)?;
        let image = self.platform.image(name).ok_or(SysError::NotFound)?;
        self.procs.exec(&mut self.frames, image)?;
        log::debug!("exec {}", name);
        Ok(SyscallOutcome::Replaced)
    }

    /// Create a child running the image named at `path`, without copying
    /// the caller.
    pub(crate) fn sys_spawn(&mut self, path: VirtAddr) -> SysResult<isize> {
        let mut buf = [0u8; MAX_PATH_LEN];
        let name = self.read_path(path, &mut buf)?;
        let now = self.platform.cycles();
        let image = self.platform.image(name).ok_or(SysError::NotFound)?;
        let pid = self.procs.spawn(&mut self.frames, image, now)?;
        log::debug!("spawn {} as pid {}", name, pid);
        Ok(pid.0 as isize)
    }

    /// Reap a zombie child; `pid <= 0` accepts any child.
    ///
    /// While matching children are still running the caller yields and the
    /// request is restarted when it next runs.
    pub(crate) fn sys_wait4(&mut self, pid: isize, status: VirtAddr) -> SysResult<SyscallOutcome> {
        match self
            .procs
            .wait(&mut self.frames, WaitTarget::from_raw(pid), status)?
        {
            WaitStatus::Reaped { pid, .. } => Ok(SyscallOutcome::Returned(pid.0 as isize)),
            WaitStatus::Pending => {
                self.procs.yield_now();
                Ok(SyscallOutcome::Restart)
            }
        }
    }

    pub(crate) fn sys_set_priority(&mut self, priority: isize) -> SysResult<isize> {
        Ok(self.procs.set_priority(priority)? as isize)
    }

    /// Copy a [`TaskInfo`] for the caller to `ti`.
    pub(crate) fn sys_task_info(&mut self, ti: VirtAddr) -> SysResult<isize> {
        let now = self.platform.cycles();
        let pcb = self.procs.caller_pcb()?;
        let info = TaskInfo {
            status: pcb.state().into(),
            syscall_times: *pcb.syscall_times(),
            time: elapsed_ms(pcb.start_cycles(), now, self.config.cpu_freq),
        };
        pcb.space().copy_out(&mut self.frames, ti, &info.to_bytes())?;
        Ok(0)
    }

    /// Read a program name from user memory.
    fn read_path<'b>(&self, path: VirtAddr, buf: &'b mut [u8; MAX_PATH_LEN]) -> SysResult<&'b str> {
        let pcb = self.procs.caller_pcb()?;
        let n = pcb
            .space()
            .copy_in_string(&self.frames, &mut buf[..], path, MAX_PATH_LEN)?;
        core::str::from_utf8(&buf[..n]).map_err(|_| SysError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CPU_FREQ, USER_BASE};
    use crate::syscall::numbers::*;
    use crate::task::Pid;
    use crate::test_support::{boot, invoke, read_user, syscall, user_buffer, write_user};

    #[test]
    fn test_getpid_getppid() {
        let mut k = boot();
        assert_eq!(syscall(&mut k, SYS_GETPID, &[]), 1);
        assert_eq!(syscall(&mut k, SYS_GETPPID, &[]), IDLE_PID as isize);

        let child = syscall(&mut k, SYS_CLONE, &[]);
        assert_eq!(child, 2);
        syscall(&mut k, SYS_SETPRIORITY, &[1000]);
        syscall(&mut k, SYS_SCHED_YIELD, &[]);
        assert_eq!(k.current_pid(), Some(Pid(2)));
        assert_eq!(syscall(&mut k, SYS_GETPID, &[]), 2);
        assert_eq!(syscall(&mut k, SYS_GETPPID, &[]), 1);
    }

    #[test]
    fn test_fork_child_sees_zero() {
        let mut k = boot();
        let child = syscall(&mut k, SYS_CLONE, &[]);
        let pcb = k.processes().by_pid(Pid(child as usize)).unwrap();
        assert_eq!(pcb.trap_frame().return_value(), 0);
        assert_eq!(
            pcb.trap_frame().sepc,
            k.processes().current_pcb().unwrap().trap_frame().sepc
        );
    }

    #[test]
    fn test_fork_exit_wait() {
        let mut k = boot();
        let status = user_buffer(&mut k);
        let child = syscall(&mut k, SYS_CLONE, &[]);
        let ecall_at = k.current_trap_frame_mut().unwrap().sepc;

        // child still running: the parent yields and will retry
        assert_eq!(invoke(&mut k, SYS_WAIT4, &[child as usize, status.as_usize()]), SyscallOutcome::Restart);
        assert_eq!(k.current_pid(), Some(Pid(child as usize)));
        let parent = k.processes().by_pid(Pid(1)).unwrap().trap_frame();
        assert_eq!(parent.sepc, ecall_at);
        assert_eq!(parent.syscall_id(), SYS_WAIT4);

        assert_eq!(invoke(&mut k, SYS_EXIT, &[(-7i32) as usize]), SyscallOutcome::Exited);
        assert_eq!(k.current_pid(), Some(Pid(1)));
        assert_eq!(k.processes().state(Pid(child as usize)), Some(ProcessState::Zombie));

        // the restarted request now reaps the child
        assert_eq!(k.handle_syscall(), Some(SyscallOutcome::Returned(child)));
        assert_eq!(read_user(&k, status, 4), (-7i32).to_le_bytes());
        assert_eq!(k.processes().children(Pid(1)), Some(alloc::vec![]));
        assert_eq!(syscall(&mut k, SYS_WAIT4, &[child as usize, 0]), -1);
    }

    #[test]
    fn test_wait_without_children() {
        let mut k = boot();
        assert_eq!(syscall(&mut k, SYS_WAIT4, &[(-1isize) as usize, 0]), -1);
    }

    #[test]
    fn test_spawn_and_exec() {
        let mut k = boot();
        let path = user_buffer(&mut k);
        write_user(&mut k, path, b"hello\0");

        let child = syscall(&mut k, SYS_SPAWN, &[path.as_usize()]);
        assert_eq!(child, 2);
        let pcb = k.processes().by_pid(Pid(2)).unwrap();
        assert_eq!(pcb.trap_frame().sepc, USER_BASE);
        assert_eq!(k.processes().children(Pid(1)), Some(alloc::vec![Pid(2)]));

        assert_eq!(invoke(&mut k, SYS_EXECVE, &[path.as_usize()]), SyscallOutcome::Replaced);
        assert_eq!(k.current_pid(), Some(Pid(1)));
        assert_eq!(k.current_trap_frame_mut().unwrap().sepc, USER_BASE);
    }

    #[test]
    fn test_spawn_unknown_program() {
        let mut k = boot();
        let path = user_buffer(&mut k);
        write_user(&mut k, path, b"nonexistent\0");
        assert_eq!(syscall(&mut k, SYS_SPAWN, &[path.as_usize()]), -1);
        assert_eq!(syscall(&mut k, SYS_EXECVE, &[path.as_usize()]), -1);
        assert_eq!(syscall(&mut k, SYS_SPAWN, &[0x7000_0000]), -1);
    }

    #[test]
    fn test_set_priority() {
        let mut k = boot();
        assert_eq!(syscall(&mut k, SYS_SETPRIORITY, &[0]), -1);
        assert_eq!(syscall(&mut k, SYS_SETPRIORITY, &[1]), -1);
        assert_eq!(syscall(&mut k, SYS_SETPRIORITY, &[2]), 2);
        assert_eq!(k.processes().priority(Pid(1)), Some(2));
    }

    #[test]
    fn test_task_info() {
        let mut k = boot();
        let buf = user_buffer(&mut k);
        syscall(&mut k, SYS_GETPID, &[]);
        k.platform_mut().cycles = CPU_FREQ / 2;

        assert_eq!(syscall(&mut k, SYS_TASK_INFO, &[buf.as_usize()]), 0);
        let bytes = read_user(&k, buf, TaskInfo::SIZE);
        let word = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        assert_eq!(word(0), TaskStatus::Running as u32);
        assert_eq!(word(1 + SYS_GETPID), 1);
        // the call being served is already counted
        assert_eq!(word(1 + SYS_TASK_INFO), 1);
        assert_eq!(word(1 + MAX_SYSCALL_NUM), 500);
    }

    #[test]
    fn test_elapsed_ms() {
        assert_eq!(elapsed_ms(0, CPU_FREQ, CPU_FREQ), 1000);
        assert_eq!(elapsed_ms(CPU_FREQ, CPU_FREQ, CPU_FREQ), 0);
        assert_eq!(elapsed_ms(0, u64::MAX, 1), u32::MAX);
    }
}
