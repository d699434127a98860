//! Platform Interface
//!
//! Everything the syscall core needs from the machine underneath it: the
//! console, the cycle counter and the table of built-in program images.
//! A board support crate implements [`Platform`] once; tests use a
//! scripted implementation.

/// Services provided by the board and its drivers.
pub trait Platform {
    /// Emit one byte on the console.
    fn console_putchar(&mut self, byte: u8);

    /// Read one byte from the console, waiting until one is available.
    fn console_getchar(&mut self) -> u8;

    /// Raw value of the free-running cycle counter.
    fn cycles(&self) -> u64;

    /// Flat binary image of the program called `name`, if there is one.
    fn image(&self, name: &str) -> Option<&[u8]>;
}
