//! # ELF Segment Loader
//!
//! Copies the `PT_LOAD` segments of an in-memory ELF image to the physical
//! addresses the image was linked for, zero-fills the tail of every segment
//! whose in-memory size exceeds its file size, and reports the entry point.
//!
//! ```text
//!  image (borrowed)                       physical memory
//! ┌──────────────┐
//! │ ELF header   │──── e_entry ─────────────────────────────► returned
//! │ e_phoff ─────┼──┐
//! ├──────────────┤  │                  p_paddr ┌──────────────┐
//! │ PT_LOAD #0 ──┼──┼── p_offset,p_filesz ────►│ file bytes   │
//! │ ...          │◄─┘                          │ zero fill    │ p_memsz - p_filesz
//! └──────────────┘                             └──────────────┘
//! ```
//!
//! The algorithm is independent of where the image comes from and of how
//! memory is written:
//!
//! * [`ImageSource`] reads bytes of the image (a slice, or a raw physical
//!   address with or without a known length).
//! * [`PhysicalMemory`] provides the copy and zero primitives
//!   ([`IdentityMemory`] on bare metal, [`WindowMemory`] for a bounded buffer).
//! * [`LoaderConfig`] selects the ELF class, the pointer width of the running
//!   code and the [`Validation`] level.
//!
//! Under [`Validation::Trusted`] the ELF magic is the only check. No
//! relocation is performed and only program headers are consulted.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "synth"))]
extern crate alloc;

mod error;
mod header;
mod image;
mod loader;
mod memory;
#[cfg(any(test, feature = "synth"))]
pub mod synth;

pub use boot_info::memory::AddressWidth;
pub use boot_info::policy::Validation;
pub use error::LoadError;
pub use header::{ELF_MAGIC, ElfClass, ElfHeader, PFlags, PT_LOAD, ProgramHeader, ProgramHeaders};
pub use image::{ImageSource, RawImage};
pub use loader::{EntryAddress, LoaderConfig, NOT_LOADABLE, SegmentLoader};
pub use memory::{IdentityMemory, PhysicalMemory, WindowMemory};
