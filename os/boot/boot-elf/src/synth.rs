//! # Synthetic ELF Images
//!
//! Builds minimal little-endian executables for tests. Only the fields the
//! loader reads are meaningful; section headers are absent.
//!
//! ```text
//! 0            e_phoff             data
//! ┌──────────┬─┬───────────────────┬──────────────────────┐
//! │ Ehdr     │ │ Phdr × n          │ segment bytes ...    │
//! └──────────┴─┴───────────────────┴──────────────────────┘
//! ```
//!
//! Segments given with an explicit file offset are placed there; all others
//! are appended after the program header table in the order they were added.

use crate::header::{ELF_MAGIC, ElfClass, PFlags, PT_LOAD};
use alloc::vec;
use alloc::vec::Vec;

const EM_386: u16 = 3;
const EM_X86_64: u16 = 62;
const ET_EXEC: u16 = 2;

#[derive(Debug, Clone)]
struct Segment {
    kind: u32,
    paddr: u64,
    offset: Option<u64>,
    data: Vec<u8>,
    memsz: u64,
}

/// Builder for a synthetic ELF executable.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    class: ElfClass,
    class_ident: u8,
    data_encoding: u8,
    entry: u64,
    phoff: Option<u64>,
    phentsize: Option<u16>,
    segments: Vec<Segment>,
}

impl ImageBuilder {
    #[must_use]
    pub const fn new(class: ElfClass) -> Self {
        Self {
            class,
            class_ident: class.ident(),
            data_encoding: 1,
            entry: 0,
            phoff: None,
            phentsize: None,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub const fn elf64() -> Self {
        Self::new(ElfClass::Elf64)
    }

    #[must_use]
    pub const fn elf32() -> Self {
        Self::new(ElfClass::Elf32)
    }

    #[must_use]
    pub const fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    /// Place the program header table at `offset` instead of right after the
    /// ELF header.
    #[must_use]
    pub const fn program_header_offset(mut self, offset: u64) -> Self {
        self.phoff = Some(offset);
        self
    }

    /// Override `e_phentsize`. The table itself keeps the natural stride.
    #[must_use]
    pub const fn program_header_entry_size(mut self, size: u16) -> Self {
        self.phentsize = Some(size);
        self
    }

    /// Override `e_ident[EI_CLASS]`.
    #[must_use]
    pub const fn class_ident(mut self, ident: u8) -> Self {
        self.class_ident = ident;
        self
    }

    /// Override `e_ident[EI_DATA]`.
    #[must_use]
    pub const fn data_encoding(mut self, encoding: u8) -> Self {
        self.data_encoding = encoding;
        self
    }

    /// Add a `PT_LOAD` segment.
    #[must_use]
    pub fn load(self, paddr: u64, data: &[u8], memsz: u64) -> Self {
        self.segment(PT_LOAD, paddr, data, memsz)
    }

    /// Add a `PT_LOAD` segment whose bytes live at file offset `offset`.
    #[must_use]
    pub fn load_at_offset(mut self, paddr: u64, offset: u64, data: &[u8], memsz: u64) -> Self {
        self.segments.push(Segment {
            kind: PT_LOAD,
            paddr,
            offset: Some(offset),
            data: data.to_vec(),
            memsz,
        });
        self
    }

    /// Add a program header of any type.
    #[must_use]
    pub fn segment(mut self, kind: u32, paddr: u64, data: &[u8], memsz: u64) -> Self {
        self.segments.push(Segment {
            kind,
            paddr,
            offset: None,
            data: data.to_vec(),
            memsz,
        });
        self
    }

    /// Serialize the image.
    ///
    /// # Panics
    /// If the requested layout does not fit in memory.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let header_size = to_usize(self.class.header_size());
        let stride = to_usize(self.class.program_header_size());
        let phoff = self.phoff.map_or(header_size, to_usize);
        let table_end = phoff + stride * self.segments.len();

        let mut cursor = self
            .segments
            .iter()
            .filter_map(|s| s.offset.map(|o| to_usize(o) + s.data.len()))
            .fold(table_end.max(header_size), usize::max);

        let mut offsets = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            if let Some(offset) = segment.offset {
                offsets.push(to_usize(offset));
            } else {
                offsets.push(cursor);
                cursor += segment.data.len();
            }
        }

        let mut image = vec![0u8; cursor];
        self.write_header(&mut image, phoff);

        for (index, (segment, &offset)) in self.segments.iter().zip(&offsets).enumerate() {
            image[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            let at = phoff + index * stride;
            self.write_program_header(&mut image[at..at + stride], segment, offset as u64);
        }

        image
    }

    fn write_header(&self, image: &mut [u8], phoff: usize) {
        let count = u16::try_from(self.segments.len()).expect("too many segments");
        image[..4].copy_from_slice(&ELF_MAGIC);
        image[4] = self.class_ident;
        image[5] = self.data_encoding;
        image[6] = 1;
        put16(image, 16, ET_EXEC);
        put32(image, 20, 1);

        match self.class {
            ElfClass::Elf32 => {
                put16(image, 18, EM_386);
                put32(image, 24, narrow(self.entry));
                put32(image, 28, narrow(phoff as u64));
                put16(image, 40, 52);
                put16(image, 42, self.phentsize.unwrap_or(32));
                put16(image, 44, count);
            }
            ElfClass::Elf64 => {
                put16(image, 18, EM_X86_64);
                put64(image, 24, self.entry);
                put64(image, 32, phoff as u64);
                put16(image, 52, 64);
                put16(image, 54, self.phentsize.unwrap_or(56));
                put16(image, 56, count);
            }
        }
    }

    fn write_program_header(&self, out: &mut [u8], segment: &Segment, offset: u64) {
        let flags = PFlags::new().with_read(true).with_execute(true).into_bits();
        let filesz = segment.data.len() as u64;
        put32(out, 0, segment.kind);
        match self.class {
            ElfClass::Elf32 => {
                put32(out, 4, narrow(offset));
                put32(out, 8, narrow(segment.paddr));
                put32(out, 12, narrow(segment.paddr));
                put32(out, 16, narrow(filesz));
                put32(out, 20, narrow(segment.memsz));
                put32(out, 24, flags);
                put32(out, 28, 0x1000);
            }
            ElfClass::Elf64 => {
                put32(out, 4, flags);
                put64(out, 8, offset);
                put64(out, 16, segment.paddr);
                put64(out, 24, segment.paddr);
                put64(out, 32, filesz);
                put64(out, 40, segment.memsz);
                put64(out, 48, 0x1000);
            }
        }
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).expect("offset exceeds the address space")
}

#[allow(clippy::cast_possible_truncation)]
const fn narrow(value: u64) -> u32 {
    value as u32
}

fn put16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put64(out: &mut [u8], at: usize, value: u64) {
    out[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
