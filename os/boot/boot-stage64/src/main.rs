//! # Transition Stub (32 → 64-bit)
//!
//! Entered from the Multiboot stage in 32-bit protected mode as
//! `stub(kernel_entry, magic, info)` with the cdecl convention. Switches the
//! CPU to long mode and calls the kernel as `kernel(magic, info)` with the
//! sysv64 convention.
//!
//! ```text
//! _start (.code32)                         stage64_main (long mode)
//!   read cdecl args → edi, esi, ebp          TransitionArgs::unpack
//!   identity map 0..4 GiB (2 MiB pages)      enter_kernel ──► kernel(magic, info)
//!   CR4.PAE, EFER.LME, CR0.PG
//!   lgdt, far return ──► .code64: zero-extend args, call stage64_main
//! ```
//!
//! Linked at `STUB_PHYS_BASE`. Build with
//!
//! ```bash
//! cargo build -p boot-stage64 --release --target x86_64-unknown-none
//! ```

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod entry;

use boot_chain::{JumpTransfer, TransitionArgs, enter_kernel, halt};
use boot_vga::{Attribute, Color, TextBuffer};
use log::{LevelFilter, error, info};

const NORMAL: Attribute = Attribute::colors(Color::White, Color::Blue);
const FAILURE: Attribute = Attribute::colors(Color::Yellow, Color::Red);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    halt()
}

/// Called from the long mode half of `_start`.
#[unsafe(no_mangle)]
extern "sysv64" fn stage64_main(kernel_entry: u32, magic: u32, boot_info: u32) -> ! {
    let _ = boot_qemu::init(LevelFilter::Debug);

    // SAFETY: the first 4 GiB are identity mapped; the display is in text mode.
    let mut screen = unsafe { TextBuffer::vga() };
    screen.write_at(1, 0, "boot-stage64", NORMAL);
    info!("Long mode entered (kernel={kernel_entry:#x}, magic={magic:#x}, info={boot_info:#x})");

    let args = TransitionArgs {
        kernel_entry,
        magic,
        boot_info,
    };

    // SAFETY: the kernel was loaded by the previous stage and takes
    // (magic, info) with the sysv64 convention.
    let mut transfer = unsafe { JumpTransfer::new() };
    let e = enter_kernel(&mut transfer, args);

    error!("Kernel handoff failed: {e}");
    screen.write_at(2, 0, "kernel handoff failed", FAILURE);
    halt()
}
