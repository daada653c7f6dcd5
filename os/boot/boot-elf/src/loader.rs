//! # ELF Segment Loader

use crate::error::LoadError;
use crate::header::{ElfClass, ElfHeader, ProgramHeader};
use crate::image::ImageSource;
use crate::memory::PhysicalMemory;
use boot_info::memory::AddressWidth;
use boot_info::policy::Validation;
use core::fmt;
use log::{debug, trace};

/// The address reserved to mean "not loaded". Zero is never a legal entry
/// point, so no [`EntryAddress`] holds it.
pub const NOT_LOADABLE: u64 = 0;

/// What to expect from an image and how far to trust it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoaderConfig {
    pub class: ElfClass,
    /// Pointer width of the code performing the copies.
    pub width: AddressWidth,
    pub validation: Validation,
}

impl LoaderConfig {
    /// ELF64 images loaded from 32-bit flat protected mode.
    pub const FLAT_32: Self = Self::new(ElfClass::Elf64, AddressWidth::Bits32, Validation::Trusted);

    /// ELF64 images loaded from identity-mapped long mode.
    pub const LONG_MODE: Self =
        Self::new(ElfClass::Elf64, AddressWidth::Bits64, Validation::Trusted);

    #[must_use]
    pub const fn new(class: ElfClass, width: AddressWidth, validation: Validation) -> Self {
        Self {
            class,
            width,
            validation,
        }
    }

    #[must_use]
    pub const fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

/// Entry point recorded in a loaded image's header. Never zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntryAddress(u64);

impl EntryAddress {
    #[must_use]
    pub const fn new(address: u64) -> Option<Self> {
        if address == NOT_LOADABLE {
            None
        } else {
            Some(Self(address))
        }
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Places the loadable segments of an ELF image at their physical addresses.
#[derive(Debug, Copy, Clone)]
pub struct SegmentLoader {
    config: LoaderConfig,
}

impl SegmentLoader {
    #[must_use]
    pub const fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load `image` into `memory` and return its entry point.
    ///
    /// Program headers are processed in table order; entries other than
    /// `PT_LOAD` are skipped. For each loadable segment `p_filesz` bytes from
    /// `p_offset` are copied to `p_paddr` and the remaining
    /// `p_memsz - p_filesz` bytes are zeroed.
    ///
    /// Under [`Validation::Strict`] the whole table is checked before the first
    /// byte is written.
    ///
    /// # Errors
    /// * [`LoadError::NotAnElfImage`] if the magic does not match; nothing else
    ///   is read and nothing is written.
    /// * [`LoadError::NullEntry`] if the header's entry is zero.
    /// * Strict-mode errors, and errors of `image` and `memory`.
    pub fn load<I, M>(&self, image: &I, memory: &mut M) -> Result<EntryAddress, LoadError>
    where
        I: ImageSource + ?Sized,
        M: PhysicalMemory + ?Sized,
    {
        let header = ElfHeader::parse(image, self.config.class)?;
        let entry = EntryAddress::new(header.entry).ok_or(LoadError::NullEntry)?;

        debug!(
            "Loading {} image: entry={entry}, phoff={:#x}, phnum={}",
            self.config.class, header.phoff, header.phnum
        );

        if self.config.validation.is_strict() {
            self.verify(image, &header)?;
        }

        for (index, ph) in header.program_headers(image).enumerate() {
            let ph = ph?;
            if !ph.is_load() {
                trace!("Skipping program header {index} of type {:#x}", ph.kind);
                continue;
            }
            self.load_segment(index, image, &ph, memory)?;
        }

        Ok(entry)
    }

    /// Strict validation of the header and every loadable segment.
    fn verify<I>(self, image: &I, header: &ElfHeader) -> Result<(), LoadError>
    where
        I: ImageSource + ?Sized,
    {
        header.check_layout()?;

        let width = self.config.width;
        if !width.can_represent(header.entry) {
            return Err(LoadError::AddressTooWide {
                address: header.entry,
                width,
            });
        }

        let table_len = header.table_size();
        if !image.contains(header.phoff, table_len) {
            return Err(LoadError::ImageOutOfBounds {
                offset: header.phoff,
                len: table_len,
            });
        }

        for (index, ph) in header.program_headers(image).enumerate() {
            let ph = ph?;
            if !ph.is_load() {
                continue;
            }
            if ph.memsz < ph.filesz {
                return Err(LoadError::MemorySizeBelowFileSize {
                    index,
                    filesz: ph.filesz,
                    memsz: ph.memsz,
                });
            }
            if !image.contains(ph.offset, ph.filesz) {
                return Err(LoadError::ImageOutOfBounds {
                    offset: ph.offset,
                    len: ph.filesz,
                });
            }
            let last = ph
                .paddr
                .checked_add(ph.memsz.saturating_sub(1))
                .ok_or(LoadError::AddressTooWide {
                    address: ph.paddr,
                    width,
                })?;
            if !width.can_represent(last) {
                return Err(LoadError::AddressTooWide {
                    address: last,
                    width,
                });
            }
        }

        Ok(())
    }

    fn load_segment<I, M>(
        self,
        index: usize,
        image: &I,
        ph: &ProgramHeader,
        memory: &mut M,
    ) -> Result<(), LoadError>
    where
        I: ImageSource + ?Sized,
        M: PhysicalMemory + ?Sized,
    {
        let width = self.config.width;
        let target = self.target_address(ph.paddr)?;

        debug!(
            "Segment {index}: paddr={target:#x} offset={:#x} filesz={:#x} memsz={:#x} flags={}",
            ph.offset, ph.filesz, ph.memsz, ph.flags
        );

        if ph.filesz > 0 {
            let bytes = image.read(ph.offset, ph.filesz)?;
            memory.copy_in(target, bytes)?;
        }

        let fill = ph.zero_fill();
        if fill > 0 {
            let bss = width.truncate(target.wrapping_add(ph.filesz));
            trace!("Segment {index}: zeroing {fill:#x} bytes at {bss:#x}");
            memory.zero(bss, fill)?;
        }

        Ok(())
    }

    /// Narrow a physical address to the configured pointer width.
    ///
    /// Trusted mode truncates, exactly like casting the address to a pointer of
    /// that width; strict mode refuses.
    fn target_address(self, paddr: u64) -> Result<u64, LoadError> {
        let width = self.config.width;
        if width.can_represent(paddr) {
            Ok(paddr)
        } else if self.config.validation.is_strict() {
            Err(LoadError::AddressTooWide {
                address: paddr,
                width,
            })
        } else {
            Ok(width.truncate(paddr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PT_LOAD;
    use crate::memory::{IdentityMemory, WindowMemory};
    use crate::synth::ImageBuilder;

    const RAM_BASE: u64 = 0;
    const RAM_SIZE: usize = 0x1_0000;

    fn ram() -> Vec<u8> {
        vec![0xAA; RAM_SIZE]
    }

    fn trusted64() -> SegmentLoader {
        SegmentLoader::new(LoaderConfig::LONG_MODE)
    }

    fn strict64() -> SegmentLoader {
        SegmentLoader::new(LoaderConfig::LONG_MODE.with_validation(Validation::Strict))
    }

    fn strict_flat() -> SegmentLoader {
        SegmentLoader::new(LoaderConfig::FLAT_32.with_validation(Validation::Strict))
    }

    fn assert_untouched(buffer: &[u8]) {
        assert!(buffer.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn rejects_bad_magic_without_touching_memory() {
        let mut image = ImageBuilder::elf64()
            .entry(0x2000)
            .load(0x2000, &[0x11; 16], 32)
            .build();
        image[0] = 0x7E;

        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            trusted64().load(image.as_slice(), &mut memory),
            Err(LoadError::NotAnElfImage)
        );
        assert_untouched(&buffer);
    }

    #[test]
    fn copies_file_bytes_and_zero_fills_the_tail() {
        let payload: Vec<u8> = (1..=24).collect();
        let image = ImageBuilder::elf64()
            .entry(0x3000)
            .load(0x3000, &payload, 0x40)
            .build();

        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        let entry = trusted64().load(image.as_slice(), &mut memory).unwrap();

        assert_eq!(entry.as_u64(), 0x3000);
        assert_eq!(memory.bytes(0x3000, 24).unwrap(), payload.as_slice());
        assert!(memory.bytes(0x3018, 0x28).unwrap().iter().all(|&b| b == 0));
        assert_eq!(memory.bytes(0x3040, 1).unwrap(), &[0xAA]);
        assert_eq!(memory.bytes(0x2FFF, 1).unwrap(), &[0xAA]);
    }

    #[test]
    fn end_to_end_scenario() {
        let payload: [u8; 16] = *b"0123456789abcdef";
        let image = ImageBuilder::elf64()
            .entry(0x2000)
            .program_header_offset(128)
            .load_at_offset(0x2000, 64, &payload, 32)
            .build();
        assert_eq!(&image[64..80], &payload);

        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        let entry = trusted64().load(image.as_slice(), &mut memory).unwrap();

        assert_eq!(entry.as_u64(), 0x2000);
        assert_eq!(memory.bytes(0x2000, 16).unwrap(), &payload);
        assert_eq!(memory.bytes(0x2010, 16).unwrap(), &[0u8; 16]);
        assert_eq!(memory.bytes(0x2020, 1).unwrap(), &[0xAA]);
    }

    #[test]
    fn table_order_does_not_change_the_result() {
        let a = [0x5Au8; 40];
        let b = [0xC3u8; 12];
        let forward = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1000, &a, 0x80)
            .load(0x4000, &b, 0x20)
            .build();
        let reversed = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x4000, &b, 0x20)
            .load(0x1000, &a, 0x80)
            .build();

        let mut first = ram();
        let mut second = ram();
        trusted64()
            .load(forward.as_slice(), &mut WindowMemory::new(RAM_BASE, &mut first))
            .unwrap();
        trusted64()
            .load(reversed.as_slice(), &mut WindowMemory::new(RAM_BASE, &mut second))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[0x1000..0x1028], &a);
        assert_eq!(&first[0x4000..0x400C], &b);
    }

    #[test]
    fn entry_is_passed_through_unmodified() {
        for entry in [0x1u64, 0x2000, 0x10_0000, 0xFFFF_FFFF, 0xFFFF_FFFF_8010_0000] {
            let image = ImageBuilder::elf64()
                .entry(entry)
                .load(0x100, &[1, 2, 3, 4], 4)
                .build();
            let mut buffer = ram();
            let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
            let loaded = trusted64().load(image.as_slice(), &mut memory).unwrap();
            assert_eq!(loaded.as_u64(), entry);
        }
    }

    #[test]
    fn zero_entry_is_rejected_before_writing() {
        let image = ImageBuilder::elf64()
            .entry(0)
            .load(0x100, &[1, 2, 3, 4], 4)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            trusted64().load(image.as_slice(), &mut memory),
            Err(LoadError::NullEntry)
        );
        assert_eq!(memory.bytes(0x100, 4).unwrap(), &[0xAA; 4]);
        assert_eq!(EntryAddress::new(NOT_LOADABLE), None);
    }

    #[test]
    fn non_load_entries_are_ignored() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .segment(4, 0x1000, &[0xEE; 8], 8)
            .load(0x2000, &[0x11; 8], 8)
            .segment(0x6474_E551, 0, &[], 0)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        trusted64().load(image.as_slice(), &mut memory).unwrap();
        assert_eq!(memory.bytes(0x1000, 8).unwrap(), &[0xAA; 8]);
        assert_eq!(memory.bytes(0x2000, 8).unwrap(), &[0x11; 8]);
    }

    #[test]
    fn trusted_flat_mode_truncates_wide_addresses() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1_0000_1000, &[0x42; 4], 8)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        SegmentLoader::new(LoaderConfig::FLAT_32)
            .load(image.as_slice(), &mut memory)
            .unwrap();
        assert_eq!(memory.bytes(0x1000, 8).unwrap(), &[0x42, 0x42, 0x42, 0x42, 0, 0, 0, 0]);
    }

    #[test]
    fn strict_flat_mode_refuses_wide_addresses() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1_0000_1000, &[0x42; 4], 8)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict_flat().load(image.as_slice(), &mut memory),
            Err(LoadError::AddressTooWide {
                address: 0x1_0000_1007,
                width: AddressWidth::Bits32
            })
        );
    }

    #[test]
    fn strict_mode_checks_the_whole_table_before_writing() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1000, &[0x42; 4], 8)
            .load(0x2000, &[0x43; 8], 4)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict64().load(image.as_slice(), &mut memory),
            Err(LoadError::MemorySizeBelowFileSize {
                index: 1,
                filesz: 8,
                memsz: 4
            })
        );
        assert_eq!(memory.bytes(0x1000, 4).unwrap(), &[0xAA; 4]);
    }

    #[test]
    fn trusted_mode_copies_file_size_even_if_memory_size_is_smaller() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x2000, &[0x43; 8], 4)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        trusted64().load(image.as_slice(), &mut memory).unwrap();
        assert_eq!(memory.bytes(0x2000, 8).unwrap(), &[0x43; 8]);
    }

    #[test]
    fn strict_mode_rejects_truncated_segments() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1000, &[0x42; 32], 32)
            .build();
        let truncated = &image[..image.len() - 8];
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert!(matches!(
            strict64().load(truncated, &mut memory),
            Err(LoadError::ImageOutOfBounds { .. })
        ));
        assert_eq!(memory.bytes(0x1000, 1).unwrap(), &[0xAA]);
    }

    #[test]
    fn strict_mode_checks_program_header_size() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .program_header_entry_size(64)
            .load(0x1000, &[1], 1)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict64().load(image.as_slice(), &mut memory),
            Err(LoadError::ProgramHeaderSize {
                expected: 56,
                found: 64
            })
        );
        assert!(trusted64().load(image.as_slice(), &mut memory).is_ok());
    }

    #[test]
    fn strict_mode_rejects_big_endian_images() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .data_encoding(2)
            .load(0x1000, &[0x42; 8], 8)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict64().load(image.as_slice(), &mut memory),
            Err(LoadError::NotLittleEndian(2))
        );
        assert_untouched(&buffer);
    }

    #[test]
    fn strict_mode_rejects_the_wrong_class() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .class_ident(1)
            .load(0x1000, &[0x42; 8], 8)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict64().load(image.as_slice(), &mut memory),
            Err(LoadError::ClassMismatch {
                expected: ElfClass::Elf64,
                found: 1
            })
        );
        assert_untouched(&buffer);
    }

    #[test]
    fn strict_flat_mode_rejects_an_entry_above_4_gib() {
        let image = ImageBuilder::elf64()
            .entry(0x1_0000_0000)
            .load(0x1000, &[0x42; 8], 8)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict_flat().load(image.as_slice(), &mut memory),
            Err(LoadError::AddressTooWide {
                address: 0x1_0000_0000,
                width: AddressWidth::Bits32
            })
        );
        assert_untouched(&buffer);
    }

    #[test]
    fn strict_mode_rejects_a_table_past_the_end_of_the_image() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1000, &[0x42; 8], 8)
            .build();
        let truncated = &image[..64 + 56 - 1];
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            strict64().load(truncated, &mut memory),
            Err(LoadError::ImageOutOfBounds {
                offset: 64,
                len: 56
            })
        );
        assert_untouched(&buffer);
    }

    #[test]
    fn identity_memory_cannot_place_a_segment_at_address_zero() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x1_0000_0000, &[1; 4], 4)
            .build();
        let mut memory = unsafe { IdentityMemory::new() };
        assert_eq!(
            SegmentLoader::new(LoaderConfig::FLAT_32).load(image.as_slice(), &mut memory),
            Err(LoadError::TargetOutOfRange { address: 0, len: 4 })
        );
    }

    #[test]
    fn loads_elf32_images() {
        let image = ImageBuilder::elf32()
            .entry(0x8000)
            .load(0x8000, &[0x90; 6], 0x10)
            .segment(PT_LOAD + 1, 0x9000, &[0xCC; 4], 4)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        let loader = SegmentLoader::new(LoaderConfig::new(
            ElfClass::Elf32,
            AddressWidth::Bits32,
            Validation::Strict,
        ));
        let entry = loader.load(image.as_slice(), &mut memory).unwrap();
        assert_eq!(entry.as_u64(), 0x8000);
        assert_eq!(memory.bytes(0x8000, 6).unwrap(), &[0x90; 6]);
        assert_eq!(memory.bytes(0x8006, 10).unwrap(), &[0; 10]);
        assert_eq!(memory.bytes(0x9000, 4).unwrap(), &[0xAA; 4]);
    }

    #[test]
    fn target_outside_memory_is_reported() {
        let image = ImageBuilder::elf64()
            .entry(0x1000)
            .load(0x2_0000, &[1; 4], 4)
            .build();
        let mut buffer = ram();
        let mut memory = WindowMemory::new(RAM_BASE, &mut buffer);
        assert_eq!(
            trusted64().load(image.as_slice(), &mut memory),
            Err(LoadError::TargetOutOfRange {
                address: 0x2_0000,
                len: 4
            })
        );
    }
}
