//! Kernel Context
//!
//! [`Kernel`] ties the pieces together: the frame allocator, the platform
//! services and the process manager. The trap entry path fills the current
//! process's [`TrapFrame`] and calls [`Kernel::handle_syscall`]; when that
//! returns, it resumes whichever process [`Kernel::current_pid`] names.

use crate::config::KernelConfig;
use crate::error::{SysError, SysResult};
use crate::hal::Platform;
use crate::mm::FrameAllocator;
use crate::task::{Pid, ProcessManager};
use crate::trap::TrapFrame;

pub struct Kernel<A: FrameAllocator, P: Platform> {
    pub(crate) config: KernelConfig,
    pub(crate) frames: A,
    pub(crate) platform: P,
    pub(crate) procs: ProcessManager,
}

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    pub fn new(config: KernelConfig, frames: A, platform: P) -> Self {
        assert!(config.cpu_freq > 0, "cpu_freq must be non-zero");
        log::info!(
            "kernel: {} process slots, {} free frames",
            config.max_processes,
            frames.free_frames()
        );
        Self {
            config,
            procs: ProcessManager::new(config.max_processes),
            frames,
            platform,
        }
    }

    /// Start the root process from the image named `init` and make it current.
    pub fn boot(&mut self, init: &str) -> SysResult<Pid> {
        let now = self.platform.cycles();
        let image = self.platform.image(init).ok_or(SysError::NotFound)?;
        let pid = self.procs.spawn(&mut self.frames, image, now)?;
        if self.procs.current().is_none() {
            self.procs.schedule();
        }
        log::info!("booted {} as pid {}", init, pid);
        Ok(pid)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn frames(&self) -> &A {
        &self.frames
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.procs
    }

    /// Pid of the process that runs when the kernel returns to user mode.
    pub fn current_pid(&self) -> Option<Pid> {
        self.procs.current_pcb().map(|pcb| pcb.pid())
    }

    /// Register state of the current process, for the trap entry/exit path.
    pub fn current_trap_frame_mut(&mut self) -> Option<&mut TrapFrame> {
        self.procs.current_pcb_mut().map(|pcb| pcb.trap_frame_mut())
    }
}
