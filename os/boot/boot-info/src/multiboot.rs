//! # Multiboot v1 Boot Information
//!
//! A Multiboot-compliant bootloader (GRUB, QEMU's `-kernel`) enters the first
//! stage with [`BOOTLOADER_MAGIC`] in `EAX` and the physical address of a
//! [`MultibootInfo`] in `EBX`. The structures here match the Multiboot v1
//! layout bit for bit; sizes and offsets are asserted below.
//!
//! The boot chain only needs the module list (the kernel image is delivered as
//! the first module) and, optionally, the memory map to confirm the static
//! layout.

use crate::memory::PhysicalRegion;
use crate::policy::Validation;
use bitfield_struct::bitfield;
use core::mem::offset_of;

/// Value in `EAX` when entered by a Multiboot-compliant bootloader.
pub const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

/// Magic that opens the [`MultibootHeader`] in the OS image.
pub const HEADER_MAGIC: u32 = 0x1BAD_B002;

#[must_use]
pub const fn is_bootloader_magic(magic: u32) -> bool {
    magic == BOOTLOADER_MAGIC
}

/// Requests encoded in the [`MultibootHeader`].
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct HeaderFlags {
    /// Align boot modules on 4 KiB boundaries.
    pub page_align: bool,
    /// Provide `mem_*` and the memory map.
    pub memory_info: bool,
    /// Provide the video mode table.
    pub video_mode: bool,
    #[bits(13)]
    __: u16,
    /// Load addresses are given in the header (a.out kludge).
    pub address_fields: bool,
    #[bits(15)]
    __: u16,
}

/// The header a Multiboot bootloader searches for in the first 8 KiB of the image.
#[repr(C, align(4))]
#[derive(Debug, Clone, Copy)]
pub struct MultibootHeader {
    pub magic: u32,
    pub flags: HeaderFlags,
    pub checksum: u32,
}

impl MultibootHeader {
    #[must_use]
    pub const fn new(flags: HeaderFlags) -> Self {
        let raw = flags.into_bits();
        Self {
            magic: HEADER_MAGIC,
            flags,
            checksum: 0u32.wrapping_sub(HEADER_MAGIC.wrapping_add(raw)),
        }
    }
}

/// Which fields of [`MultibootInfo`] the bootloader filled in.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct InfoFlags {
    pub memory: bool,
    pub boot_device: bool,
    pub cmdline: bool,
    pub mods: bool,
    pub aout_syms: bool,
    pub elf_shdr: bool,
    pub mmap: bool,
    pub drives: bool,
    pub config_table: bool,
    pub boot_loader_name: bool,
    pub apm_table: bool,
    pub vbe: bool,
    pub framebuffer: bool,
    #[bits(19)]
    __: u32,
}

/// The Multiboot v1 information structure.
///
/// `packed(4)`: the bootloader only guarantees 4-byte alignment, which would
/// make a naturally aligned `framebuffer_addr` unsound to reference. Read
/// fields by value.
#[repr(C, packed(4))]
#[derive(Debug, Clone, Copy)]
pub struct MultibootInfo {
    pub flags: InfoFlags,
    /// KiB of lower memory (below 1 MiB).
    pub mem_lower: u32,
    /// KiB of upper memory (starting at 1 MiB).
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
    pub syms: [u32; 4],
    /// Size of the memory map buffer in bytes.
    pub mmap_length: u32,
    pub mmap_addr: u32,
    pub drives_length: u32,
    pub drives_addr: u32,
    pub config_table: u32,
    pub boot_loader_name: u32,
    pub apm_table: u32,
    pub vbe_control_info: u32,
    pub vbe_mode_info: u32,
    pub vbe_mode: u16,
    pub vbe_interface_seg: u16,
    pub vbe_interface_off: u16,
    pub vbe_interface_len: u16,
    pub framebuffer_addr: u64,
    pub framebuffer_pitch: u32,
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub framebuffer_bpp: u8,
    pub framebuffer_type: u8,
    pub color_info: [u8; 6],
}

const _: () = {
    assert!(size_of::<MultibootInfo>() == 116);
    assert!(offset_of!(MultibootInfo, mods_count) == 20);
    assert!(offset_of!(MultibootInfo, mods_addr) == 24);
    assert!(offset_of!(MultibootInfo, mmap_length) == 44);
    assert!(offset_of!(MultibootInfo, mmap_addr) == 48);
    assert!(offset_of!(MultibootInfo, boot_loader_name) == 64);
    assert!(offset_of!(MultibootInfo, vbe_mode) == 80);
    assert!(offset_of!(MultibootInfo, framebuffer_addr) == 88);
    assert!(offset_of!(MultibootInfo, framebuffer_bpp) == 108);
    assert!(offset_of!(MultibootInfo, color_info) == 110);
};

impl MultibootInfo {
    /// An all-zero structure with no flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            flags: InfoFlags::new(),
            mem_lower: 0,
            mem_upper: 0,
            boot_device: 0,
            cmdline: 0,
            mods_count: 0,
            mods_addr: 0,
            syms: [0; 4],
            mmap_length: 0,
            mmap_addr: 0,
            drives_length: 0,
            drives_addr: 0,
            config_table: 0,
            boot_loader_name: 0,
            apm_table: 0,
            vbe_control_info: 0,
            vbe_mode_info: 0,
            vbe_mode: 0,
            vbe_interface_seg: 0,
            vbe_interface_off: 0,
            vbe_interface_len: 0,
            framebuffer_addr: 0,
            framebuffer_pitch: 0,
            framebuffer_width: 0,
            framebuffer_height: 0,
            framebuffer_bpp: 0,
            framebuffer_type: 0,
            color_info: [0; 6],
        }
    }

    /// Upper memory in bytes, if the bootloader reported it.
    #[must_use]
    pub const fn upper_memory_bytes(&self) -> Option<u64> {
        if self.flags.memory() {
            Some(self.mem_upper as u64 * 1024)
        } else {
            None
        }
    }
}

/// One entry of the module table at `mods_addr`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MultibootModule {
    pub mod_start: u32,
    /// One past the last byte of the module.
    pub mod_end: u32,
    /// Physical address of the module's NUL-terminated command line.
    pub string: u32,
    pub reserved: u32,
}

const _: () = assert!(size_of::<MultibootModule>() == 16);

impl MultibootModule {
    #[must_use]
    pub const fn range(&self) -> ModuleRange {
        ModuleRange::new(self.mod_start as u64, self.mod_end as u64)
    }
}

/// Physical extent `[start, end)` of a boot module.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ModuleRange {
    pub start: u64,
    pub end: u64,
}

impl ModuleRange {
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Length in bytes; an inverted range is empty.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read access to the payloads the bootloader loaded alongside the image.
pub trait BootModules {
    #[must_use]
    fn module_count(&self) -> usize;

    #[must_use]
    fn module(&self, index: usize) -> Option<ModuleRange>;

    #[must_use]
    fn first_module(&self) -> Option<ModuleRange> {
        if self.module_count() == 0 {
            None
        } else {
            self.module(0)
        }
    }
}

impl BootModules for [MultibootModule] {
    fn module_count(&self) -> usize {
        self.len()
    }

    fn module(&self, index: usize) -> Option<ModuleRange> {
        self.get(index).map(MultibootModule::range)
    }
}

impl BootModules for [ModuleRange] {
    fn module_count(&self) -> usize {
        self.len()
    }

    fn module(&self, index: usize) -> Option<ModuleRange> {
        self.get(index).copied()
    }
}

/// Type of a memory map entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MemoryKind {
    Available,
    Reserved,
    AcpiReclaimable,
    Nvs,
    BadRam,
    Other(u32),
}

impl From<u32> for MemoryKind {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Available,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::Nvs,
            5 => Self::BadRam,
            other => Self::Other(other),
        }
    }
}

/// One decoded memory map record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MemoryMapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryKind,
}

impl MemoryMapEntry {
    #[must_use]
    pub const fn region(&self) -> PhysicalRegion {
        PhysicalRegion::new(self.base, self.length)
    }
}

/// Iterator over the raw memory map buffer.
///
/// Records are `size`-prefixed: `size: u32` (not counting itself),
/// `base_addr: u64`, `length: u64`, `type: u32`.
#[derive(Debug, Clone)]
pub struct MemoryMap<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> MemoryMap<'a> {
    const MIN_RECORD: usize = 20;

    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Ranges reported as available RAM.
    pub fn available(self) -> impl Iterator<Item = PhysicalRegion> + Clone + 'a {
        self.filter(|e| e.kind == MemoryKind::Available)
            .map(|e| e.region())
    }
}

impl Iterator for MemoryMap<'_> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.offset..)?;
        let size = rest.get(0..4).map(le32)? as usize;
        if size < Self::MIN_RECORD {
            self.offset = self.bytes.len();
            return None;
        }
        let end = size.checked_add(4)?;
        let record = rest.get(4..end)?;
        self.offset += end;
        Some(MemoryMapEntry {
            base: le64(&record[0..8]),
            length: le64(&record[8..16]),
            kind: MemoryKind::from(le32(&record[16..20])),
        })
    }
}

impl core::iter::FusedIterator for MemoryMap<'_> {}

#[inline]
const fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
const fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}

/// Whether `mods_count` is honored: always when trusted, only with the `mods`
/// flag when strict.
const fn exposes_modules(flags: InfoFlags, validation: Validation) -> bool {
    flags.mods() || !validation.is_strict()
}

/// Read-only view over a [`MultibootInfo`] and the tables it points to.
#[derive(Debug, Clone, Copy)]
pub struct MultibootView<'a> {
    info: &'a MultibootInfo,
    modules: &'a [MultibootModule],
    mmap: &'a [u8],
}

impl<'a> MultibootView<'a> {
    /// Build a view from already resolved tables.
    ///
    /// Under [`Validation::Strict`] the module table is only exposed if the
    /// `mods` flag is set; under [`Validation::Trusted`] the count is taken at
    /// face value. The memory map always requires the `mmap` flag.
    #[must_use]
    pub fn from_parts(
        info: &'a MultibootInfo,
        modules: &'a [MultibootModule],
        mmap: &'a [u8],
        validation: Validation,
    ) -> Self {
        let flags = info.flags;
        Self {
            info,
            modules: if exposes_modules(flags, validation) {
                modules
            } else {
                &[]
            },
            mmap: if flags.mmap() { mmap } else { &[] },
        }
    }

    /// View the structure the bootloader handed over at `address`.
    ///
    /// # Safety
    /// `address` must point to a valid [`MultibootInfo`] in identity-mapped
    /// memory, and its `mods_addr`/`mmap_addr` tables must be valid for the
    /// counts it reports (for the flags honored under `validation`). All of it
    /// must stay untouched for `'a`.
    #[must_use]
    pub unsafe fn from_raw(address: usize, validation: Validation) -> Self {
        // SAFETY: identity mapping is a mapping at offset 0.
        unsafe { Self::from_mapped(address, 0, validation) }
    }

    /// View a structure whose physical memory is mapped at `offset`: the
    /// structure itself and every table it refers to are read at
    /// `offset + physical address`.
    ///
    /// # Safety
    /// As for [`from_raw`](Self::from_raw), with every address shifted by
    /// `offset`.
    #[must_use]
    pub unsafe fn from_mapped(address: usize, offset: usize, validation: Validation) -> Self {
        let at = |physical: u32| offset.wrapping_add(physical as usize);

        // SAFETY: guaranteed by the caller.
        let info = unsafe { &*(offset.wrapping_add(address) as *const MultibootInfo) };
        let flags = info.flags;

        let modules: &[MultibootModule] =
            if exposes_modules(flags, validation) && info.mods_count > 0 {
                // SAFETY: the bootloader reports `mods_count` entries at `mods_addr`.
                unsafe {
                    core::slice::from_raw_parts(
                        at(info.mods_addr) as *const MultibootModule,
                        info.mods_count as usize,
                    )
                }
            } else {
                &[]
            };

        let mmap: &[u8] = if flags.mmap() && info.mmap_length > 0 {
            // SAFETY: the bootloader reports `mmap_length` bytes at `mmap_addr`.
            unsafe {
                core::slice::from_raw_parts(at(info.mmap_addr) as *const u8, info.mmap_length as usize)
            }
        } else {
            &[]
        };

        Self::from_parts(info, modules, mmap, validation)
    }

    #[must_use]
    pub const fn info(&self) -> &'a MultibootInfo {
        self.info
    }

    #[must_use]
    pub const fn modules(&self) -> &'a [MultibootModule] {
        self.modules
    }

    #[must_use]
    pub const fn memory_map(&self) -> MemoryMap<'a> {
        MemoryMap::new(self.mmap)
    }

    #[must_use]
    pub const fn has_memory_map(&self) -> bool {
        !self.mmap.is_empty()
    }
}

impl BootModules for MultibootView<'_> {
    fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn module(&self, index: usize) -> Option<ModuleRange> {
        self.modules.module(index)
    }
}
