//! Console I/O: `read` on standard input and `write` on standard output.

use crate::config::MAX_STR_LEN;
use crate::error::{SysError, SysResult};
use crate::hal::Platform;
use crate::kernel::Kernel;
use crate::mm::{FrameAllocator, PteFlags, VirtAddr};

use super::validate::{STDIN, STDOUT};

impl<A: FrameAllocator, P: Platform> Kernel<A, P> {
    /// Print the string at `buf` on the console.
    ///
    /// At most `min(len, MAX_STR_LEN)` bytes are taken and a NUL ends the
    /// string early. Returns the number of bytes printed.
    pub(crate) fn sys_write(&mut self, fd: usize, buf: VirtAddr, len: usize) -> SysResult<isize> {
        if fd != STDOUT {
            return Err(SysError::BadFd);
        }
        let mut text = [0u8; MAX_STR_LEN];
        let pcb = self.procs.caller_pcb()?;
        let n = pcb
            .space()
            .copy_in_string(&self.frames, &mut text, buf, len.min(MAX_STR_LEN))?;
        for &byte in &text[..n] {
            self.platform.console_putchar(byte);
        }
        Ok(n as isize)
    }

    /// Read exactly `len` console bytes into `buf`.
    ///
    /// The destination is checked before any input is consumed.
    pub(crate) fn sys_read(&mut self, fd: usize, buf: VirtAddr, len: usize) -> SysResult<isize> {
        if fd != STDIN {
            return Err(SysError::BadFd);
        }
        self.procs
            .caller_pcb()?
            .space()
            .check_range(buf, len, PteFlags::W)?;

        let mut chunk = [0u8; MAX_STR_LEN];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(chunk.len());
            for byte in &mut chunk[..n] {
                *byte = self.platform.console_getchar();
            }
            let dst = buf.checked_add(done).ok_or(SysError::BadAddress)?;
            self.procs
                .caller_pcb()?
                .space()
                .copy_out(&mut self.frames, dst, &chunk[..n])?;
            done += n;
        }
        Ok(len as isize)
    }
}
