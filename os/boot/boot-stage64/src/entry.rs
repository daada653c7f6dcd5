//! `_start`: 32-bit protected mode to long mode.

use core::arch::global_asm;

const BOOT_STACK_SIZE: usize = 64 * 1024;

/// Number of page directories; each maps 1 GiB with 2 MiB pages.
const IDENTITY_MAPPED_GIB: usize = 4;

#[repr(C, align(4096))]
struct PageTable([u64; 512]);

#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_PML4: PageTable = PageTable([0; 512]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_PDPT: PageTable = PageTable([0; 512]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_PD: [PageTable; IDENTITY_MAPPED_GIB] =
    [const { PageTable([0; 512]) }; IDENTITY_MAPPED_GIB];

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

// In:  [esp + 4] = kernel entry, [esp + 8] = magic, [esp + 12] = info (cdecl).
// Out: rdi = kernel entry, rsi = magic, rdx = info, zero-extended (sysv64).
global_asm!(
    r#"
    .section .text._start, "ax"
    .code32
    .global _start
_start:
    cli
    cld
    mov edi, dword ptr [esp + 4]
    mov esi, dword ptr [esp + 8]
    mov ebp, dword ptr [esp + 12]

    # PML4[0] -> PDPT
    mov eax, offset {pdpt}
    or eax, 0x3
    mov dword ptr [{pml4}], eax
    mov dword ptr [{pml4} + 4], 0

    # PDPT[0..n] -> PD[0..n]
    mov eax, offset {pd}
    or eax, 0x3
    xor ecx, ecx
2:
    mov dword ptr [{pdpt} + ecx * 8], eax
    mov dword ptr [{pdpt} + ecx * 8 + 4], 0
    add eax, 0x1000
    inc ecx
    cmp ecx, {gib}
    jne 2b

    # PD[i] = i * 2 MiB | huge | writable | present
    xor ecx, ecx
3:
    mov eax, ecx
    shl eax, 21
    or eax, 0x83
    mov dword ptr [{pd} + ecx * 8], eax
    mov dword ptr [{pd} + ecx * 8 + 4], 0
    inc ecx
    cmp ecx, {gib} * 512
    jne 3b

    mov eax, offset {pml4}
    mov cr3, eax

    # CR4.PAE
    mov eax, cr4
    or eax, 1 << 5
    mov cr4, eax

    # EFER.LME
    mov ecx, 0xC0000080
    rdmsr
    or eax, 1 << 8
    wrmsr

    # CR0.PG
    mov eax, cr0
    or eax, 1 << 31
    mov cr0, eax

    lgdt [stage64_gdt_pointer]
    push 0x08
    push offset stage64_long_mode
    retf

    .code64
stage64_long_mode:
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    mov ss, ax

    mov edi, edi
    mov esi, esi
    mov edx, ebp

    lea rsp, [rip + {stack} + {stack_size}]
    xor ebp, ebp
    call {main}

4:
    cli
    hlt
    jmp 4b

    .section .rodata.stage64_gdt, "a"
    .balign 8
stage64_gdt:
    .quad 0
    .quad 0x00AF9A000000FFFF
    .quad 0x00CF92000000FFFF
stage64_gdt_end:
stage64_gdt_pointer:
    .word stage64_gdt_end - stage64_gdt - 1
    .long stage64_gdt
    "#,
    pml4 = sym BOOT_PML4,
    pdpt = sym BOOT_PDPT,
    pd = sym BOOT_PD,
    gib = const IDENTITY_MAPPED_GIB,
    stack = sym BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    main = sym crate::stage64_main,
);
