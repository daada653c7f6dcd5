use core::fmt;

/// The port QEMU's `isa-debugcon` listens on by default.
pub const DEBUGCON_PORT: u16 = 0x402;

/// A write-only byte sink on an x86 I/O port.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DebugPort {
    port: u16,
}

impl DebugPort {
    /// QEMU's debug console.
    pub const QEMU: Self = Self::new(DEBUGCON_PORT);

    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self { port }
    }

    #[must_use]
    pub const fn port(self) -> u16 {
        self.port
    }

    #[inline]
    pub fn put(self, byte: u8) {
        io::outb(self.port, byte);
    }
}

impl fmt::Write for DebugPort {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.put(b);
        }
        Ok(())
    }
}

/// Backs [`qemu_trace!`](crate::qemu_trace).
#[inline]
pub fn trace(args: fmt::Arguments<'_>) {
    // Best effort; the port cannot fail.
    let _ = fmt::write(&mut DebugPort::QEMU, args);
}

#[cfg(all(
    feature = "enabled",
    any(target_arch = "x86", target_arch = "x86_64"),
    not(test)
))]
mod io {
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn outb(port: u16, value: u8) {
        // SAFETY: writing a debug port has no memory effects; on hardware
        // without the device the write is ignored.
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}

#[cfg(not(all(
    feature = "enabled",
    any(target_arch = "x86", target_arch = "x86_64"),
    not(test)
)))]
mod io {
    #[inline]
    pub const fn outb(_port: u16, _value: u8) {}
}
