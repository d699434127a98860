//! Trap Frames
//!
//! The register snapshot captured when user execution traps into the kernel.
//! The assembly entry sequence that fills it lives with the platform; the
//! system-call path only reads the request registers and writes the single
//! return slot.
//!
//! # Register Convention (RISC-V)
//! - `a7`: request identifier
//! - `a0`..`a5`: arguments
//! - `a0`: return value

/// Size of the `ecall` instruction.
pub const ECALL_SIZE: usize = 4;

/// Register numbers used by the system-call convention.
pub mod reg {
    pub const SP: usize = 2;
    pub const A0: usize = 10;
    pub const A7: usize = 17;
}

/// Saved user register state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// General purpose registers x0-x31
    pub x: [usize; 32],
    /// Address of the trapping instruction (return address)
    pub sepc: usize,
}

impl TrapFrame {
    /// A zeroed frame.
    pub const fn zeroed() -> Self {
        Self { x: [0; 32], sepc: 0 }
    }

    /// A fresh frame that starts a program at `entry` with stack `sp`.
    pub fn for_user_entry(entry: usize, sp: usize) -> Self {
        let mut frame = Self::zeroed();
        frame.sepc = entry;
        frame.x[reg::SP] = sp;
        frame
    }

    /// Request identifier.
    #[inline]
    pub fn syscall_id(&self) -> usize {
        self.x[reg::A7]
    }

    /// The six raw argument words.
    #[inline]
    pub fn syscall_args(&self) -> [usize; 6] {
        let mut args = [0; 6];
        args.copy_from_slice(&self.x[reg::A0..reg::A0 + 6]);
        args
    }

    /// Write the return slot.
    #[inline]
    pub fn set_return(&mut self, value: isize) {
        self.x[reg::A0] = value as usize;
    }

    /// Value currently in the return slot.
    #[inline]
    pub fn return_value(&self) -> isize {
        self.x[reg::A0] as isize
    }

    /// Build the frame user space would present for `id` with `args`.
    pub fn syscall(id: usize, args: &[usize]) -> Self {
        let mut frame = Self::zeroed();
        frame.x[reg::A7] = id;
        frame.x[reg::A0..reg::A0 + args.len()].copy_from_slice(args);
        frame
    }
}

impl Default for TrapFrame {
    fn default() -> Self {
        Self::zeroed()
    }
}
