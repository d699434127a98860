//! Shared fixtures for unit tests: a scripted platform and a booted kernel.

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use crate::config::KernelConfig;
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{BitmapFrameAllocator, PhysAddr, PteFlags, VirtAddr, PAGE_SIZE};
use crate::syscall::SyscallOutcome;
use crate::trap::reg;

/// Console and clock driven by the test.
#[derive(Default)]
pub struct TestPlatform {
    pub output: Vec<u8>,
    pub input: VecDeque<u8>,
    pub cycles: u64,
    images: Vec<(String, Vec<u8>)>,
}

impl TestPlatform {
    pub fn with_image(mut self, name: &str, image: &[u8]) -> Self {
        self.images.push((name.into(), image.to_vec()));
        self
    }
}

impl Platform for TestPlatform {
    fn console_putchar(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn console_getchar(&mut self) -> u8 {
        self.input.pop_front().expect("console input exhausted")
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn image(&self, name: &str) -> Option<&[u8]> {
        self.images
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, image)| image.as_slice())
    }
}

pub type TestKernel = Kernel<BitmapFrameAllocator, TestPlatform>;

/// `ecall; j .`
pub const INIT_IMAGE: &[u8] = &[0x73, 0, 0, 0, 0x6f, 0, 0, 0];

/// A kernel with `init` running as pid 1 and a `hello` image available.
pub fn boot() -> TestKernel {
    let frames = BitmapFrameAllocator::new(PhysAddr::new(0x8040_0000), 256);
    let platform = TestPlatform::default()
        .with_image("init", INIT_IMAGE)
        .with_image("hello", &[0x13, 0, 0, 0]);
    let mut kernel = Kernel::new(KernelConfig::default(), frames, platform);
    kernel.boot("init").unwrap();
    kernel
}

/// Trap into the kernel from the current process with `id` and `args`.
pub fn invoke(kernel: &mut TestKernel, id: usize, args: &[usize]) -> SyscallOutcome {
    let frame = kernel.current_trap_frame_mut().expect("no running process");
    frame.x[reg::A7] = id;
    frame.x[reg::A0..reg::A0 + 6].fill(0);
    frame.x[reg::A0..reg::A0 + args.len()].copy_from_slice(args);
    kernel.handle_syscall().unwrap()
}

/// Like [`invoke`], returning what the caller finds in `a0`.
pub fn syscall(kernel: &mut TestKernel, id: usize, args: &[usize]) -> isize {
    let slot = kernel.procs.current().expect("no running process");
    invoke(kernel, id, args);
    kernel.procs.get(slot).unwrap().trap_frame().return_value()
}

/// Address of a two-page read/write scratch buffer in the current process.
pub fn user_buffer(kernel: &mut TestKernel) -> VirtAddr {
    let va = VirtAddr::new(0x2000_0000);
    let pcb = kernel.procs.current_pcb_mut().unwrap();
    if pcb.space.translate(va).is_none() {
        pcb.space
            .map(&mut kernel.frames, va, 2 * PAGE_SIZE, PteFlags::R | PteFlags::W)
            .unwrap();
    }
    va
}

pub fn write_user(kernel: &mut TestKernel, va: VirtAddr, bytes: &[u8]) {
    let pcb = kernel.procs.current_pcb().unwrap();
    pcb.space().copy_out(&mut kernel.frames, va, bytes).unwrap();
}

pub fn read_user(kernel: &TestKernel, va: VirtAddr, len: usize) -> Vec<u8> {
    let mut bytes = std::vec![0u8; len];
    let pcb = kernel.procs.current_pcb().unwrap();
    pcb.space().copy_in(&kernel.frames, &mut bytes, va).unwrap();
    bytes
}
