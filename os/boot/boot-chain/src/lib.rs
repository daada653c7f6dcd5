//! # Stage Chainer
//!
//! Loads the next boot stage with [`boot_elf`] and hands control to it.
//!
//! ```text
//!  boot-stage32 (x86, cdecl)                boot-stage64            kernel
//! ┌──────────────────────────┐  Cdecl32   ┌───────────────┐ SysV64 ┌────────┐
//! │ load stub   (embedded)   │──────────► │ enter long    │──────► │ entry  │
//! │ load kernel (module/blob)│ (entry,    │ mode, widen   │ (magic,│        │
//! │ pack TransitionArgs      │  magic,    │ arguments     │  info) │        │
//! └──────────────────────────┘  info)     └───────────────┘        └────────┘
//! ```
//!
//! Every address that becomes executable goes through [`EntryPoint::new`],
//! which pairs it with a [`CallingConvention`] and checks that it is non-zero
//! and representable at that convention's pointer width. Arguments crossing the
//! 32-bit hop are narrowed by [`TransitionArgs::pack`] and widened again by
//! [`TransitionArgs::unpack`].
//!
//! The jump itself sits behind [`ControlTransfer`]. [`JumpTransfer`] performs
//! it for real; [`RecordingTransfer`] only records what would have happened.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

#[allow(unsafe_code)]
mod chainer;
mod config;
mod entry;
mod error;
#[allow(unsafe_code)]
mod halt;
mod handoff;
#[allow(unsafe_code)]
mod jump;
mod transfer;

pub use chainer::{StageChainer, enter_kernel};
pub use config::{ChainConfig, KernelSource};
pub use entry::{CallingConvention, EntryPoint};
pub use error::ChainError;
pub use halt::halt;
pub use handoff::{ArgumentSlot, BootHandoff, HandoffError, StageArgs, TransitionArgs};
pub use jump::JumpTransfer;
pub use transfer::{ControlTransfer, RecordingTransfer, TransferRecord};
