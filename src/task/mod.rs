//! Process and Scheduling Model
//!
//! [`ProcessManager`] owns the process table, the run queue and the notion
//! of "current process", and implements the lifecycle operations the
//! system calls need: create, fork, exec, spawn, wait, exit, priority and
//! voluntary yield.
//!
//! # Execution Model
//! One hardware thread, no preemption inside the kernel. At most one process
//! is `Running`; it is the one whose trap is being served. A context switch
//! here means choosing a new current process: the trap-return path resumes
//! whichever process is current when dispatch finishes.
//!
//! Waiting is cooperative. [`ProcessManager::wait`] never blocks; when the
//! children it is interested in are still running it reports
//! [`WaitStatus::Pending`], the caller yields, and the request is issued
//! again the next time the waiter is scheduled.

mod loader;
mod pcb;
mod sched;
mod table;

pub use loader::{load_image, LoadedImage};
pub use pcb::{Pid, ProcessControlBlock, ProcessState, Slot};
pub use sched::RunQueue;
pub use table::ProcessTable;

use crate::config::{MIN_PRIORITY, USER_BASE};
use crate::error::{SysError, SysResult};
use crate::mm::{AddressSpace, FrameAllocator, VirtAddr};
use crate::trap::TrapFrame;

/// Which children a wait request is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Any,
    Pid(Pid),
}

impl WaitTarget {
    /// Decode the raw pid argument: any value `<= 0` means "any child".
    pub fn from_raw(raw: isize) -> Self {
        if raw <= 0 {
            Self::Any
        } else {
            Self::Pid(Pid(raw as usize))
        }
    }

    fn matches(self, pid: Pid) -> bool {
        match self {
            Self::Any => true,
            Self::Pid(want) => want == pid,
        }
    }
}

/// Result of one wait attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A zombie child was collected.
    Reaped { pid: Pid, exit_code: i32 },
    /// Matching children exist but none has exited yet.
    Pending,
}

/// Process table plus scheduling state.
pub struct ProcessManager {
    table: ProcessTable,
    queue: RunQueue,
    current: Option<Slot>,
    /// Adopts orphans; the first process spawned with nothing running.
    root: Option<Slot>,
}

impl ProcessManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            table: ProcessTable::new(capacity),
            queue: RunQueue::new(),
            current: None,
            root: None,
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Slot of the running process.
    pub fn current(&self) -> Option<Slot> {
        self.current
    }

    /// Control block of the running process.
    pub fn current_pcb(&self) -> Option<&ProcessControlBlock> {
        self.current.map(|slot| self.table.expect(slot))
    }

    pub fn current_pcb_mut(&mut self) -> Option<&mut ProcessControlBlock> {
        self.current.map(|slot| self.table.expect_mut(slot))
    }

    pub fn get(&self, slot: Slot) -> Option<&ProcessControlBlock> {
        self.table.get(slot)
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut ProcessControlBlock> {
        self.table.get_mut(slot)
    }

    /// Look up a process by pid.
    pub fn by_pid(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.table.find(pid).map(|slot| self.table.expect(slot))
    }

    /// Pids of `pid`'s children, zombies included.
    pub fn children(&self, pid: Pid) -> Option<alloc::vec::Vec<Pid>> {
        let pcb = self.by_pid(pid)?;
        Some(pcb.children.iter().map(|&c| self.table.expect(c).pid).collect())
    }

    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.by_pid(pid).map(|pcb| pcb.state)
    }

    pub fn priority(&self, pid: Pid) -> Option<usize> {
        self.by_pid(pid).map(|pcb| pcb.priority)
    }

    /// How many times `pid` has issued request `id`.
    pub fn syscall_count(&self, pid: Pid, id: usize) -> Option<u32> {
        self.by_pid(pid)?.syscall_times.get(id).copied()
    }

    /// Pid of the process that adopts orphans.
    pub fn root_pid(&self) -> Option<Pid> {
        self.root.map(|slot| self.table.expect(slot).pid)
    }

    /// Number of processes waiting in the run queue.
    pub fn runnable(&self) -> usize {
        self.queue.len()
    }

    /// Slot of the process whose request is being served.
    fn caller(&self) -> SysResult<Slot> {
        self.current.ok_or(SysError::InvalidArgument)
    }

    pub(crate) fn caller_pcb(&self) -> SysResult<&ProcessControlBlock> {
        Ok(self.table.expect(self.caller()?))
    }

    pub(crate) fn caller_pcb_mut(&mut self) -> SysResult<&mut ProcessControlBlock> {
        let slot = self.caller()?;
        Ok(self.table.expect_mut(slot))
    }

    /// Claim a control block with an empty address space.
    ///
    /// The new process is `Runnable` but not queued; the caller queues it
    /// with [`ProcessManager::activate`] once it is fully set up.
    pub fn create(&mut self, now: u64) -> SysResult<Slot> {
        let space = AddressSpace::new(VirtAddr::new(USER_BASE));
        let slot = self.table.alloc(space, now)?;
        log::debug!("created pid {}", self.table.expect(slot).pid);
        Ok(slot)
    }

    /// Queue a created process for scheduling.
    pub fn activate(&mut self, slot: Slot) {
        self.table.expect_mut(slot).state = ProcessState::Runnable;
        self.queue.push(slot);
    }

    /// Create a process from a program image and queue it.
    ///
    /// It becomes a child of the current process. The first process spawned
    /// with nothing running becomes the root. Nothing is left behind on failure.
    pub fn spawn<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        image: &[u8],
        now: u64,
    ) -> SysResult<Pid> {
        let (space, loaded) = load_image(frames, image)?;
        let slot = match self.create(now) {
            Ok(slot) => slot,
            Err(err) => {
                let mut space = space;
                space.release(frames);
                return Err(err);
            }
        };
        let parent = self.current;
        let pcb = self.table.expect_mut(slot);
        pcb.space = space;
        pcb.trap_frame = TrapFrame::for_user_entry(loaded.entry, loaded.user_sp);
        pcb.parent = parent;
        let pid = pcb.pid;
        match parent {
            Some(parent) => self.table.expect_mut(parent).children.push(slot),
            None if self.root.is_none() => self.root = Some(slot),
            None => {}
        }
        self.activate(slot);
        Ok(pid)
    }

    /// Duplicate the current process.
    ///
    /// The child gets a private copy of every mapped page and the parent's
    /// registers with a zero return value. Returns the child's pid.
    pub fn fork<A: FrameAllocator + ?Sized>(&mut self, frames: &mut A, now: u64) -> SysResult<Pid> {
        let parent = self.caller()?;
        let space = self.table.expect(parent).space.duplicate(frames)?;
        let slot = match self.create(now) {
            Ok(slot) => slot,
            Err(err) => {
                let mut space = space;
                space.release(frames);
                return Err(err);
            }
        };

        let (frame, priority) = {
            let p = self.table.expect(parent);
            (p.trap_frame, p.priority)
        };
        let child = self.table.expect_mut(slot);
        child.space = space;
        child.trap_frame = frame;
        child.trap_frame.set_return(0);
        child.priority = priority;
        child.parent = Some(parent);
        let pid = child.pid;

        self.table.expect_mut(parent).children.push(slot);
        self.activate(slot);
        log::debug!("fork: {} -> {}", self.table.expect(parent).pid, pid);
        Ok(pid)
    }

    /// Replace the current program with `image`.
    ///
    /// Pid and family links survive. On failure the old address space is
    /// untouched.
    pub fn exec<A: FrameAllocator + ?Sized>(&mut self, frames: &mut A, image: &[u8]) -> SysResult<()> {
        let slot = self.caller()?;
        let (space, loaded) = load_image(frames, image)?;
        let pcb = self.table.expect_mut(slot);
        let mut old = core::mem::replace(&mut pcb.space, space);
        pcb.trap_frame = TrapFrame::for_user_entry(loaded.entry, loaded.user_sp);
        old.release(frames);
        Ok(())
    }

    /// Try to reap a child of the current process matching `target`.
    ///
    /// `status` receives the exit code (a 4-byte `i32`) unless it is null;
    /// it is checked before anything is reaped, so a bad pointer never loses
    /// a child.
    pub fn wait<A: FrameAllocator + ?Sized>(
        &mut self,
        frames: &mut A,
        target: WaitTarget,
        status: VirtAddr,
    ) -> SysResult<WaitStatus> {
        let parent = self.caller()?;
        let me = self.table.expect(parent);

        let mut matched = false;
        let mut zombie = None;
        for &child in &me.children {
            let pcb = self.table.expect(child);
            if target.matches(pcb.pid) {
                matched = true;
                if pcb.state == ProcessState::Zombie {
                    zombie = Some(child);
                    break;
                }
            }
        }
        if !matched {
            return Err(SysError::NoSuchChild);
        }
        let Some(child) = zombie else {
            return Ok(WaitStatus::Pending);
        };

        let exit_code = self.table.expect(child).exit_code;
        if status.as_usize() != 0 {
            me.space.copy_out(frames, status, &exit_code.to_le_bytes())?;
        }

        self.table.expect_mut(parent).children.retain(|&c| c != child);
        let reaped = self.table.free(child);
        log::debug!("reaped pid {} (code {})", reaped.pid, exit_code);
        Ok(WaitStatus::Reaped {
            pid: reaped.pid,
            exit_code,
        })
    }

    /// Terminate the current process with `code` and switch away from it.
    pub fn exit<A: FrameAllocator + ?Sized>(&mut self, frames: &mut A, code: i32) {
        let Some(slot) = self.current.take() else {
            return;
        };
        let root = self.root.filter(|&root| root != slot);
        let pcb = self.table.expect_mut(slot);
        pcb.state = ProcessState::Zombie;
        pcb.exit_code = code;
        pcb.space.release(frames);
        let children = core::mem::take(&mut pcb.children);
        let parent = pcb.parent;
        log::debug!("pid {} exited with {}", pcb.pid, code);

        for &child in &children {
            self.table.expect_mut(child).parent = root;
        }
        match root {
            Some(root) => self.table.expect_mut(root).children.extend(children),
            // No one left to adopt them: already-dead orphans can go now,
            // live ones are freed when they exit.
            None => {
                for child in children {
                    if self.table.state(child) == ProcessState::Zombie {
                        self.table.free(child);
                    }
                }
            }
        }

        if self.root == Some(slot) {
            self.root = None;
        }
        if parent.is_none() {
            self.table.free(slot);
        }
        self.schedule();
    }

    /// Set the current process's priority. Values below 2 are reserved.
    pub fn set_priority(&mut self, value: isize) -> SysResult<usize> {
        if value < MIN_PRIORITY {
            return Err(SysError::InvalidArgument);
        }
        let pcb = self.table.expect_mut(self.caller()?);
        pcb.priority = value as usize;
        Ok(pcb.priority)
    }

    /// Give up the rest of the current turn.
    pub fn yield_now(&mut self) {
        if let Some(slot) = self.current.take() {
            self.activate(slot);
        }
        self.schedule();
    }

    /// Pick the next process to run. Leaves no current process when nothing
    /// is runnable.
    pub fn schedule(&mut self) -> Option<Slot> {
        debug_assert!(self.current.is_none(), "schedule with a running process");
        let next = self.queue.pick(&mut self.table)?;
        self.table.expect_mut(next).state = ProcessState::Running;
        self.current = Some(next);
        log::trace!("switch to pid {}", self.table.expect(next).pid);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::{BitmapFrameAllocator, PhysAddr, PteFlags, PAGE_SIZE};

    const IMAGE: &[u8] = &[0x73, 0, 0, 0];

    fn setup(capacity: usize) -> (BitmapFrameAllocator, ProcessManager, Pid) {
        let mut frames = BitmapFrameAllocator::new(PhysAddr::new(0x8040_0000), 64);
        let mut procs = ProcessManager::new(capacity);
        let root = procs.spawn(&mut frames, IMAGE, 0).unwrap();
        procs.schedule();
        (frames, procs, root)
    }

    fn current_pid(procs: &ProcessManager) -> Pid {
        procs.current_pcb().unwrap().pid()
    }

    /// Run processes until `pid` is current.
    fn switch_to(procs: &mut ProcessManager, pid: Pid) {
        for _ in 0..16 {
            if current_pid(procs) == pid {
                return;
            }
            procs.yield_now();
        }
        panic!("pid {} never scheduled", pid);
    }

    #[test]
    fn test_first_process_is_root_and_running() {
        let (_frames, procs, root) = setup(4);
        assert_eq!(procs.root_pid(), Some(root));
        assert_eq!(current_pid(&procs), root);
        assert_eq!(procs.current_pcb().unwrap().state(), ProcessState::Running);
        assert_eq!(procs.current_pcb().unwrap().parent(), None);
    }

    #[test]
    fn test_fork_copies_memory_and_registers() {
        let (mut frames, mut procs, root) = setup(4);
        let buf = VirtAddr::new(0x2000_0000);
        {
            let pcb = procs.current_pcb_mut().unwrap();
            pcb.space.map(&mut frames, buf, PAGE_SIZE, PteFlags::R | PteFlags::W).unwrap();
            pcb.space.copy_out(&mut frames, buf, b"hello").unwrap();
            pcb.trap_frame.sepc = 0x1234;
        }

        let child = procs.fork(&mut frames, 7).unwrap();
        assert_eq!(procs.children(root), Some(alloc::vec![child]));

        let cpcb = procs.by_pid(child).unwrap();
        assert_eq!(cpcb.trap_frame().return_value(), 0);
        assert_eq!(cpcb.trap_frame().sepc, 0x1234);
        assert_eq!(cpcb.state(), ProcessState::Runnable);
        let mut data = [0u8; 5];
        cpcb.space().copy_in(&frames, &mut data, buf).unwrap();
        assert_eq!(&data, b"hello");
        assert_ne!(cpcb.space().translate(buf), procs.current_pcb().unwrap().space().translate(buf));
    }

    #[test]
    fn test_fork_fails_cleanly_when_table_full() {
        let (mut frames, mut procs, root) = setup(1);
        let before = frames.free_frames();
        assert_eq!(procs.fork(&mut frames, 0), Err(SysError::TooManyProcesses));
        assert_eq!(frames.free_frames(), before);
        assert_eq!(procs.children(root), Some(alloc::vec![]));
    }

    #[test]
    fn test_exit_then_wait_reaps_once() {
        let (mut frames, mut procs, root) = setup(4);
        let status = VirtAddr::new(0x2000_0000);
        procs
            .current_pcb_mut()
            .unwrap()
            .space
            .map(&mut frames, status, PAGE_SIZE, PteFlags::R | PteFlags::W)
            .unwrap();
        let child = procs.fork(&mut frames, 0).unwrap();

        assert_eq!(procs.wait(&mut frames, WaitTarget::Pid(child), status), Ok(WaitStatus::Pending));

        switch_to(&mut procs, child);
        procs.exit(&mut frames, 42);
        assert_eq!(current_pid(&procs), root);
        assert_eq!(procs.by_pid(child).unwrap().state(), ProcessState::Zombie);

        assert_eq!(
            procs.wait(&mut frames, WaitTarget::Any, status),
            Ok(WaitStatus::Reaped { pid: child, exit_code: 42 })
        );
        let mut code = [0u8; 4];
        procs.current_pcb().unwrap().space().copy_in(&frames, &mut code, status).unwrap();
        assert_eq!(i32::from_le_bytes(code), 42);

        assert!(procs.by_pid(child).is_none());
        assert_eq!(procs.children(root), Some(alloc::vec![]));
        assert_eq!(
            procs.wait(&mut frames, WaitTarget::Pid(child), status),
            Err(SysError::NoSuchChild)
        );
    }

    #[test]
    fn test_wait_with_bad_status_pointer_keeps_zombie() {
        let (mut frames, mut procs, _root) = setup(4);
        let child = procs.fork(&mut frames, 0).unwrap();
        switch_to(&mut procs, child);
        procs.exit(&mut frames, 1);

        assert_eq!(
            procs.wait(&mut frames, WaitTarget::Any, VirtAddr::new(0x7000_0000)),
            Err(SysError::BadAddress)
        );
        assert_eq!(procs.by_pid(child).unwrap().state(), ProcessState::Zombie);
        assert!(matches!(
            procs.wait(&mut frames, WaitTarget::Any, VirtAddr::new(0)),
            Ok(WaitStatus::Reaped { .. })
        ));
    }

    #[test]
    fn test_exit_reparents_children_to_root() {
        let (mut frames, mut procs, root) = setup(4);
        let middle = procs.fork(&mut frames, 0).unwrap();
        switch_to(&mut procs, middle);
        let grandchild = procs.fork(&mut frames, 0).unwrap();
        procs.exit(&mut frames, 0);

        let g = procs.by_pid(grandchild).unwrap();
        assert_eq!(g.parent().map(|s| procs.get(s).unwrap().pid()), Some(root));
        let mut kids = procs.children(root).unwrap();
        kids.sort();
        assert_eq!(kids, alloc::vec![middle, grandchild]);
    }

    #[test]
    fn test_root_exit_frees_zombies_and_detaches_live_children() {
        let (mut frames, mut procs, root) = setup(4);
        let dead = procs.fork(&mut frames, 0).unwrap();
        let live = procs.fork(&mut frames, 0).unwrap();
        switch_to(&mut procs, dead);
        procs.exit(&mut frames, 3);
        assert_eq!(procs.state(dead), Some(ProcessState::Zombie));

        switch_to(&mut procs, root);
        procs.exit(&mut frames, 0);
        assert_eq!(procs.root_pid(), None);
        assert!(procs.by_pid(root).is_none());
        assert!(procs.by_pid(dead).is_none());
        assert_eq!(procs.by_pid(live).unwrap().parent(), None);
        assert_eq!(procs.table().len(), 1);

        assert_eq!(current_pid(&procs), live);
        procs.exit(&mut frames, 0);
        assert!(procs.current().is_none());
        assert_eq!(procs.table().len(), 0);
        assert_eq!(frames.free_frames(), frames.total_frames());
    }

    #[test]
    fn test_exit_releases_address_space() {
        let (mut frames, mut procs, _root) = setup(4);
        let before = frames.free_frames();
        let child = procs.fork(&mut frames, 0).unwrap();
        assert!(frames.free_frames() < before);
        switch_to(&mut procs, child);
        procs.exit(&mut frames, 0);
        assert_eq!(frames.free_frames(), before);
    }

    #[test]
    fn test_set_priority_bounds() {
        let (_frames, mut procs, root) = setup(2);
        assert_eq!(procs.set_priority(0), Err(SysError::InvalidArgument));
        assert_eq!(procs.set_priority(1), Err(SysError::InvalidArgument));
        assert_eq!(procs.set_priority(-5), Err(SysError::InvalidArgument));
        assert_eq!(procs.set_priority(2), Ok(2));
        assert_eq!(procs.by_pid(root).unwrap().priority(), 2);
    }

    #[test]
    fn test_exec_keeps_identity_and_old_space_on_failure() {
        let (mut frames, mut procs, root) = setup(4);
        let child = procs.fork(&mut frames, 0).unwrap();
        procs.current_pcb_mut().unwrap().trap_frame.sepc = 0x5000;

        let free = frames.free_frames();
        let huge = alloc::vec![0u8; (free + 1) * PAGE_SIZE];
        assert_eq!(procs.exec(&mut frames, &huge), Err(SysError::OutOfMemory));
        assert_eq!(procs.current_pcb().unwrap().trap_frame().sepc, 0x5000);
        assert_eq!(frames.free_frames(), free);

        procs.exec(&mut frames, IMAGE).unwrap();
        let pcb = procs.current_pcb().unwrap();
        assert_eq!(pcb.pid(), root);
        assert_eq!(pcb.trap_frame().sepc, crate::config::USER_BASE);
        assert_eq!(procs.children(root), Some(alloc::vec![child]));
    }

    #[test]
    fn test_only_one_process_running() {
        let (mut frames, mut procs, _root) = setup(4);
        procs.fork(&mut frames, 0).unwrap();
        procs.fork(&mut frames, 0).unwrap();
        for _ in 0..6 {
            procs.yield_now();
            let running = procs
                .table()
                .iter()
                .filter(|(_, p)| p.state() == ProcessState::Running)
                .count();
            assert_eq!(running, 1);
        }
    }
}
