//! # ELF Header Parsing
//!
//! Only the fields the segment loader acts on are decoded. Fields are read
//! little-endian from byte offsets, so the image needs no particular alignment.

use crate::error::LoadError;
use crate::image::ImageSource;
use bitfield_struct::bitfield;
use core::fmt;

/// `\x7FELF`
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Program header type of a loadable segment.
pub const PT_LOAD: u32 = 1;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFDATA2LSB: u8 = 1;

/// Layout of the header and program header table.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ElfClass {
    Elf32,
    #[default]
    Elf64,
}

impl ElfClass {
    /// `e_ident[EI_CLASS]` value.
    #[must_use]
    pub const fn ident(self) -> u8 {
        match self {
            Self::Elf32 => 1,
            Self::Elf64 => 2,
        }
    }

    #[must_use]
    pub const fn header_size(self) -> u64 {
        match self {
            Self::Elf32 => 52,
            Self::Elf64 => 64,
        }
    }

    #[must_use]
    pub const fn program_header_size(self) -> u64 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 56,
        }
    }
}

impl fmt::Display for ElfClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Elf32 => "ELF32",
            Self::Elf64 => "ELF64",
        })
    }
}

/// The fields of `Elf{32,64}_Ehdr` used by the loader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ElfHeader {
    pub class: ElfClass,
    /// `e_ident[EI_CLASS]` as found in the image.
    pub class_ident: u8,
    /// `e_ident[EI_DATA]` as found in the image.
    pub data_encoding: u8,
    pub machine: u16,
    pub entry: u64,
    pub phoff: u64,
    pub phentsize: u16,
    pub phnum: u16,
}

impl ElfHeader {
    /// Check the magic, then decode the header with the layout of `class`.
    ///
    /// The magic is read on its own first so that a non-ELF image is rejected
    /// after reading four bytes.
    ///
    /// # Errors
    /// [`LoadError::NotAnElfImage`] on a magic mismatch, or a read error from
    /// `image`.
    pub fn parse<I>(image: &I, class: ElfClass) -> Result<Self, LoadError>
    where
        I: ImageSource + ?Sized,
    {
        let magic = image
            .read(0, ELF_MAGIC.len() as u64)
            .map_err(|_| LoadError::NotAnElfImage)?;
        if magic != ELF_MAGIC {
            return Err(LoadError::NotAnElfImage);
        }

        let b = image.read(0, class.header_size())?;
        let (entry, phoff, phentsize, phnum) = match class {
            ElfClass::Elf32 => (
                u64::from(le32(&b[24..28])),
                u64::from(le32(&b[28..32])),
                le16(&b[42..44]),
                le16(&b[44..46]),
            ),
            ElfClass::Elf64 => (
                le64(&b[24..32]),
                le64(&b[32..40]),
                le16(&b[54..56]),
                le16(&b[56..58]),
            ),
        };

        Ok(Self {
            class,
            class_ident: b[EI_CLASS],
            data_encoding: b[EI_DATA],
            machine: le16(&b[18..20]),
            entry,
            phoff,
            phentsize,
            phnum,
        })
    }

    /// Header checks applied under strict validation.
    ///
    /// # Errors
    /// The first mismatch between the image and the configured layout.
    pub fn check_layout(&self) -> Result<(), LoadError> {
        if self.class_ident != self.class.ident() {
            return Err(LoadError::ClassMismatch {
                expected: self.class,
                found: self.class_ident,
            });
        }
        if self.data_encoding != ELFDATA2LSB {
            return Err(LoadError::NotLittleEndian(self.data_encoding));
        }
        let expected = u16::try_from(self.stride()).unwrap_or(u16::MAX);
        if self.phentsize != expected {
            return Err(LoadError::ProgramHeaderSize {
                expected,
                found: self.phentsize,
            });
        }
        Ok(())
    }

    /// Distance between program header entries.
    ///
    /// Always the natural size of the class; `e_phentsize` is only compared
    /// against it under strict validation.
    #[must_use]
    pub const fn stride(&self) -> u64 {
        self.class.program_header_size()
    }

    /// Total size of the program header table in bytes.
    #[must_use]
    pub fn table_size(&self) -> u64 {
        u64::from(self.phnum) * self.stride()
    }

    /// Iterate the program header table in table order.
    #[must_use]
    pub const fn program_headers<'a, I>(&self, image: &'a I) -> ProgramHeaders<'a, I>
    where
        I: ImageSource + ?Sized,
    {
        ProgramHeaders {
            image,
            class: self.class,
            phoff: self.phoff,
            count: self.phnum,
            index: 0,
        }
    }
}

/// `Elf*_Phdr.p_flags`: bit0=X, bit1=W, bit2=R.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    pub execute: bool,
    pub write: bool,
    pub read: bool,
    #[bits(29)]
    __: u32,
}

impl fmt::Display for PFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.read(), 'R'),
            flag(self.write(), 'W'),
            flag(self.execute(), 'X')
        )
    }
}

/// One decoded program header, widened to 64-bit fields for either class.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProgramHeader {
    pub kind: u32,
    pub flags: PFlags,
    pub offset: u64,
    /// Unused; segments are placed at their physical address.
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    /// Unused; no relocation is performed.
    pub align: u64,
}

impl ProgramHeader {
    /// Decode an entry from exactly `class.program_header_size()` bytes.
    #[must_use]
    pub fn parse(s: &[u8], class: ElfClass) -> Self {
        match class {
            ElfClass::Elf32 => Self {
                kind: le32(&s[0..4]),
                offset: u64::from(le32(&s[4..8])),
                vaddr: u64::from(le32(&s[8..12])),
                paddr: u64::from(le32(&s[12..16])),
                filesz: u64::from(le32(&s[16..20])),
                memsz: u64::from(le32(&s[20..24])),
                flags: PFlags::from_bits(le32(&s[24..28])),
                align: u64::from(le32(&s[28..32])),
            },
            ElfClass::Elf64 => Self {
                kind: le32(&s[0..4]),
                flags: PFlags::from_bits(le32(&s[4..8])),
                offset: le64(&s[8..16]),
                vaddr: le64(&s[16..24]),
                paddr: le64(&s[24..32]),
                filesz: le64(&s[32..40]),
                memsz: le64(&s[40..48]),
                align: le64(&s[48..56]),
            },
        }
    }

    #[must_use]
    pub const fn is_load(&self) -> bool {
        self.kind == PT_LOAD
    }

    /// Bytes to zero after the file-backed part.
    #[must_use]
    pub const fn zero_fill(&self) -> u64 {
        self.memsz.saturating_sub(self.filesz)
    }
}

/// Program header iterator reading straight from the image.
pub struct ProgramHeaders<'a, I: ?Sized> {
    image: &'a I,
    class: ElfClass,
    phoff: u64,
    count: u16,
    index: u16,
}

impl<I> Iterator for ProgramHeaders<'_, I>
where
    I: ImageSource + ?Sized,
{
    type Item = Result<ProgramHeader, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let stride = self.class.program_header_size();
        let offset = self
            .phoff
            .wrapping_add(u64::from(self.index).wrapping_mul(stride));
        self.index += 1;
        Some(
            self.image
                .read(offset, stride)
                .map(|bytes| ProgramHeader::parse(bytes, self.class)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let r = usize::from(self.count - self.index);
        (r, Some(r))
    }
}

impl<I> ExactSizeIterator for ProgramHeaders<'_, I> where I: ImageSource + ?Sized {}

#[inline]
const fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
const fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
const fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}
