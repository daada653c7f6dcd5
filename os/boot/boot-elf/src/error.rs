use crate::header::ElfClass;
use boot_info::memory::AddressWidth;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("The image does not start with the ELF magic")]
    NotAnElfImage,
    #[error("The image declares entry point 0")]
    NullEntry,
    #[error("The image is not an {expected} file (class byte {found})")]
    ClassMismatch { expected: ElfClass, found: u8 },
    #[error("The image is not little-endian (data byte {0})")]
    NotLittleEndian(u8),
    #[error("Program header entries are {found} bytes, expected {expected}")]
    ProgramHeaderSize { expected: u16, found: u16 },
    #[error("{len:#x} bytes at image offset {offset:#x} lie outside the image")]
    ImageOutOfBounds { offset: u64, len: u64 },
    #[error("Segment {index} has a memory size {memsz:#x} below its file size {filesz:#x}")]
    MemorySizeBelowFileSize { index: usize, filesz: u64, memsz: u64 },
    #[error("Address {address:#x} is not reachable with {width} pointers")]
    AddressTooWide { address: u64, width: AddressWidth },
    #[error("{len:#x} bytes at physical address {address:#x} are outside writable memory")]
    TargetOutOfRange { address: u64, len: u64 },
}
