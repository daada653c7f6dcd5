//! # Boot Configuration and Boot Information
//!
//! Shared definitions for every stage of the boot chain: the validation policy
//! applied to build-time inputs, the static physical memory layout the stages
//! agree on, and the Multiboot v1 information structure handed over by the
//! bootloader.
//!
//! ## Modules
//!
//! * [`policy`]: [`Validation`](policy::Validation), the single switch between
//!   the minimal trusted fast path and a hardened, bounds-checked path.
//! * [`memory`]: the static memory map ([`MemoryLayout`](memory::MemoryLayout))
//!   and its one-time startup validation.
//! * [`multiboot`]: the bit-exact Multiboot v1 structures and a read-only view
//!   over the boot modules and memory map.
//!
//! ## Physical Memory Layout
//!
//! The default layout mirrors where the individual images are linked:
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1 MiB)        │
//! KERNEL      ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//! STUB        ├─────────────────────────────────┤ 0x0320_0000
//!             │   64-bit Transition Stub        │
//! LOADER      ├─────────────────────────────────┤ 0x0330_0000
//!             │   Multiboot Stage (this code)   │
//!             ├─────────────────────────────────┤
//!             │           (free)                │
//! SCRATCH     ├─────────────────────────────────┤ 0x0640_0000 (100 MiB)
//!             │   Module Staging Area           │
//!             └─────────────────────────────────┘
//! ```
//!
//! ## ABI Compatibility
//!
//! All structures shared with the bootloader are `#[repr(C)]` (packed where the
//! protocol requires it) and their sizes and field offsets are asserted at
//! compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
#[allow(unsafe_code)]
pub mod multiboot;
pub mod policy;
