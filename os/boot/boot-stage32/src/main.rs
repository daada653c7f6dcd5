//! # Multiboot Stage (32-bit)
//!
//! Loaded by a Multiboot v1 bootloader into flat 32-bit protected mode. Loads
//! the 64-bit transition stub linked into this binary, loads the kernel, and
//! calls the stub with the kernel entry, the bootloader magic and the address
//! of the Multiboot information structure.
//!
//! ```text
//! bootloader ──► _start ──► stage32_main(magic, info)
//!                              │ load boot-stage64 (embedded)
//!                              │ load kernel (first module | embedded)
//!                              ▼
//!                           stub(kernel_entry, magic, info)   cdecl
//! ```
//!
//! ## Building
//!
//! ```bash
//! BOOT_STAGE64_ELF=target/x86_64-unknown-none/release/boot-stage64 \
//! cargo build -p boot-stage32 --release \
//!     --target os/boot/boot-stage32/i686-boot.json \
//!     -Zbuild-std=core,compiler_builtins -Zbuild-std-features=compiler-builtins-mem
//! qemu-system-x86_64 -m 256M -debugcon stdio \
//!     -kernel target/i686-boot/release/boot-stage32 -initrd kernel.elf
//! ```
//!
//! ## Features
//!
//! * `module-kernel` (default) or `embedded-kernel`: where the kernel comes
//!   from. Exactly one must be enabled.
//! * `strict`: validate beyond the ELF magic.
//! * `qemu` (default): log to QEMU's debug console.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod entry;
mod images;
mod tracing;

use boot_chain::{
    BootHandoff, ChainConfig, ChainError, JumpTransfer, KernelSource, StageChainer, halt,
};
use boot_elf::{IdentityMemory, LoaderConfig, Validation};
use boot_info::memory::{AddressWidth, DEFAULT_LAYOUT};
use boot_info::multiboot::{MultibootView, is_bootloader_magic};
use boot_vga::{Attribute, Color, TextBuffer, TextWriter};
use core::fmt::Write;
use log::{LevelFilter, error, info, warn};

#[cfg(all(feature = "module-kernel", feature = "embedded-kernel"))]
compile_error!("features `module-kernel` and `embedded-kernel` are mutually exclusive");

#[cfg(not(any(feature = "module-kernel", feature = "embedded-kernel")))]
compile_error!("enable one of the features `module-kernel` or `embedded-kernel`");

#[cfg(feature = "embedded-kernel")]
const KERNEL_SOURCE: KernelSource<'static> = KernelSource::Embedded(images::KERNEL);

#[cfg(not(feature = "embedded-kernel"))]
const KERNEL_SOURCE: KernelSource<'static> = KernelSource::Module;

#[cfg(feature = "strict")]
const VALIDATION: Validation = Validation::Strict;

#[cfg(not(feature = "strict"))]
const VALIDATION: Validation = Validation::Trusted;

const NORMAL: Attribute = Attribute::colors(Color::White, Color::Blue);
const FAILURE: Attribute = Attribute::colors(Color::Yellow, Color::Red);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    halt()
}

/// Called from `_start` with the registers the bootloader set up.
#[unsafe(no_mangle)]
extern "cdecl" fn stage32_main(magic: u32, info: u32) -> ! {
    let _ = boot_qemu::init(LevelFilter::Debug);

    // SAFETY: the bootloader leaves the display in 80×25 text mode.
    let mut screen = unsafe { TextBuffer::vga() };
    screen.clear(NORMAL);
    screen.write_at(0, 0, "boot-stage32", NORMAL);
    info!("Multiboot stage entered (magic={magic:#x}, info={info:#x})");

    if !is_bootloader_magic(magic) {
        warn!("Unexpected bootloader magic {magic:#x}; continuing");
    }

    // SAFETY: EBX holds the address of the information structure, and nothing
    // overwrites it before the kernel takes over.
    let view = unsafe { MultibootView::from_raw(info as usize, VALIDATION) };
    tracing::trace_multiboot_info(&view);

    let failure = chain(&view, BootHandoff::new(magic, u64::from(info)));
    error!("Boot chain failed: {failure}");

    let mut writer = TextWriter::new(screen, FAILURE).at_row(2);
    let _ = writer.write_str("boot chain failed");
    writer.set_attribute(NORMAL);
    let _ = write!(writer, ": {failure}");
    halt()
}

fn chain(view: &MultibootView<'_>, handoff: BootHandoff) -> ChainError {
    let layout = match DEFAULT_LAYOUT.validate(AddressWidth::Bits32) {
        Ok(layout) => layout,
        Err(e) => return e.into(),
    };

    if VALIDATION.is_strict() && view.has_memory_map() {
        if let Err(e) = layout.confirm_available(view.memory_map().available()) {
            return e.into();
        }
    }

    let config = ChainConfig::new(
        LoaderConfig::FLAT_32.with_validation(VALIDATION),
        layout,
        KERNEL_SOURCE,
    );

    // SAFETY: paging is off, so physical addresses are identity mapped; the
    // validated layout keeps every target clear of this stage.
    let memory = unsafe { IdentityMemory::new() };
    // SAFETY: the stub is entered with its cdecl (entry, magic, info) ABI.
    let transfer = unsafe { JumpTransfer::new() };

    let mut chainer = StageChainer::new(config, memory, transfer);
    chainer.chain_two_stage(images::STAGE64, view, handoff)
}
