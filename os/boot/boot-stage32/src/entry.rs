//! Multiboot header and `_start`.

use boot_info::multiboot::{HeaderFlags, MultibootHeader};
use core::arch::global_asm;

#[used]
#[unsafe(link_section = ".multiboot")]
static MULTIBOOT_HEADER: MultibootHeader =
    MultibootHeader::new(HeaderFlags::new().with_page_align(true).with_memory_info(true));

const BOOT_STACK_SIZE: usize = 64 * 1024;

#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

// EAX = bootloader magic, EBX = physical address of the information structure.
global_asm!(
    r#"
    .section .text._start, "ax"
    .global _start
_start:
    cli
    cld
    mov esp, offset {stack} + {stack_size}
    xor ebp, ebp

    sub esp, 8
    push ebx
    push eax
    call {main}

2:
    cli
    hlt
    jmp 2b
    "#,
    stack = sym BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    main = sym crate::stage32_main,
);
