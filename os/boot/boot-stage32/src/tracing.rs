//! # Trace output

use boot_info::multiboot::{BootModules, MemoryKind, MultibootView};
use boot_qemu::qemu_trace;

pub fn trace_multiboot_info(view: &MultibootView<'_>) {
    let info = view.info();
    let flags = info.flags;

    qemu_trace!("Multiboot info:\n");
    qemu_trace!("  flags = {:#010x}\n", flags.into_bits());
    if flags.memory() {
        let (lower, upper) = (info.mem_lower, info.mem_upper);
        qemu_trace!("  mem_lower = {lower} KiB, mem_upper = {upper} KiB\n");
    }
    if flags.cmdline() {
        let cmdline = info.cmdline;
        qemu_trace!("  cmdline at {cmdline:#x}\n");
    }

    qemu_trace!("  modules = {}\n", view.module_count());
    for index in 0..view.module_count() {
        if let Some(module) = view.module(index) {
            qemu_trace!(
                "    [{index}] {:#010x}..{:#010x} ({} bytes)\n",
                module.start,
                module.end,
                module.len()
            );
        }
    }

    if view.has_memory_map() {
        qemu_trace!("  memory map:\n");
        for entry in view.memory_map() {
            let kind = match entry.kind {
                MemoryKind::Available => "available",
                MemoryKind::Reserved => "reserved",
                MemoryKind::AcpiReclaimable => "ACPI reclaimable",
                MemoryKind::Nvs => "ACPI NVS",
                MemoryKind::BadRam => "bad RAM",
                MemoryKind::Other(_) => "other",
            };
            qemu_trace!(
                "    {:#018x} + {:#x} {kind}\n",
                entry.base,
                entry.length
            );
        }
    }
}
