//! Images linked into this stage by `build.rs`.

/// The 64-bit transition stub.
pub const STAGE64: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/boot-stage64.elf"));

/// The kernel.
#[cfg(feature = "embedded-kernel")]
pub const KERNEL: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/kernel.elf"));
