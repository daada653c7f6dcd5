//! # QEMU Debug Console
//!
//! Early-boot output through QEMU's `debugcon` device: every byte written to
//! I/O port `0x402` shows up on the host.
//!
//! ```text
//! log::info!(..) ──► DebugconLogger ─┐
//!                                    ├──► DebugPort (fmt::Write) ──► out 0x402
//! qemu_trace!(..) ───────────────────┘
//! ```
//!
//! Neither path allocates. Both work in 32-bit protected mode and in long mode,
//! before anything else of the stage is initialized.
//!
//! Capture the output with
//!
//! ```bash
//! qemu-system-x86_64 -kernel boot-stage32 -debugcon stdio
//! ```
//!
//! ## Features
//!
//! * `enabled` (default): port writes are compiled in on x86 and x86-64.
//!   Without it, or on any other architecture, writes are discarded.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod port;

pub use logger::{DebugconLogger, init, write_record};
pub use port::{DEBUGCON_PORT, DebugPort};

#[doc(hidden)]
pub mod __private {
    pub use crate::port::trace;
}

/// `print!`-style output to the debug console, bypassing the logger.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::__private::trace(core::format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn trace_accepts_format_arguments() {
        let entry = 0x10_0000_u32;
        qemu_trace!("entry at {entry:#x}\n");
        qemu_trace!("{} segments\n", 3);
    }
}
