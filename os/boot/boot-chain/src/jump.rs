//! The only place an address becomes a function pointer.

use crate::entry::{CallingConvention, EntryPoint};
use crate::handoff::{BootHandoff, HandoffError, StageArgs, TransitionArgs};
use crate::transfer::ControlTransfer;

/// Performs one-way jumps into loaded stages.
#[derive(Debug)]
pub struct JumpTransfer {
    _private: (),
}

impl JumpTransfer {
    /// # Safety
    /// Every [`EntryPoint`] passed to [`ControlTransfer::transfer`] must be the
    /// entry of a fully loaded stage that takes the given arguments with the
    /// given convention. Nothing of the caller's state survives the jump.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl ControlTransfer for JumpTransfer {
    fn transfer(&mut self, entry: EntryPoint, args: StageArgs) -> HandoffError {
        let Ok(address) = usize::try_from(entry.address()) else {
            return HandoffError::EntryTooWide {
                address: entry.address(),
                convention: entry.convention(),
            };
        };

        log::info!("Jumping to {entry}");
        match (entry.convention(), args) {
            (CallingConvention::Cdecl32, StageArgs::Transition(args)) => {
                // SAFETY: per `JumpTransfer::new`.
                unsafe { cdecl32::call_transition(address, args) }
            }
            (CallingConvention::Cdecl32, StageArgs::Boot(handoff)) => {
                // SAFETY: per `JumpTransfer::new`.
                unsafe { cdecl32::call_kernel(address, handoff) }
            }
            (CallingConvention::SysV64, StageArgs::Boot(handoff)) => {
                // SAFETY: per `JumpTransfer::new`.
                unsafe { sysv64::call_kernel(address, handoff) }
            }
            (convention @ CallingConvention::SysV64, StageArgs::Transition(_)) => {
                HandoffError::ArgumentMismatch(convention)
            }
        }
    }
}

#[cfg(target_arch = "x86")]
mod cdecl32 {
    use super::{BootHandoff, HandoffError, TransitionArgs};
    use crate::handoff::ArgumentSlot;

    type TransitionEntry = extern "cdecl" fn(u32, u32, u32) -> !;
    type KernelEntry = extern "cdecl" fn(u32, u32) -> !;

    pub unsafe fn call_transition(address: usize, args: TransitionArgs) -> HandoffError {
        // SAFETY: the caller guarantees `address` is a transition stub entry.
        let stage = unsafe { core::mem::transmute::<usize, TransitionEntry>(address) };
        stage(args.kernel_entry, args.magic, args.boot_info)
    }

    pub unsafe fn call_kernel(address: usize, handoff: BootHandoff) -> HandoffError {
        let Ok(boot_info) = u32::try_from(handoff.boot_info) else {
            return HandoffError::DoesNotFit {
                slot: ArgumentSlot::BootInfo,
                value: handoff.boot_info,
            };
        };
        // SAFETY: the caller guarantees `address` is a kernel entry.
        let kernel = unsafe { core::mem::transmute::<usize, KernelEntry>(address) };
        kernel(handoff.magic, boot_info)
    }
}

#[cfg(not(target_arch = "x86"))]
mod cdecl32 {
    use super::{BootHandoff, CallingConvention, HandoffError, TransitionArgs};

    pub unsafe fn call_transition(_address: usize, _args: TransitionArgs) -> HandoffError {
        HandoffError::UnsupportedConvention(CallingConvention::Cdecl32)
    }

    pub unsafe fn call_kernel(_address: usize, _handoff: BootHandoff) -> HandoffError {
        HandoffError::UnsupportedConvention(CallingConvention::Cdecl32)
    }
}

#[cfg(target_arch = "x86_64")]
mod sysv64 {
    use super::{BootHandoff, HandoffError};

    type KernelEntry = extern "sysv64" fn(u32, u64) -> !;

    pub unsafe fn call_kernel(address: usize, handoff: BootHandoff) -> HandoffError {
        // SAFETY: the caller guarantees `address` is a kernel entry.
        let kernel = unsafe { core::mem::transmute::<usize, KernelEntry>(address) };
        kernel(handoff.magic, handoff.boot_info)
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod sysv64 {
    use super::{BootHandoff, CallingConvention, HandoffError};

    pub unsafe fn call_kernel(_address: usize, _handoff: BootHandoff) -> HandoffError {
        HandoffError::UnsupportedConvention(CallingConvention::SysV64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_arch = "x86"))]
    fn foreign_convention_is_refused() {
        let mut jump = unsafe { JumpTransfer::new() };
        let entry = EntryPoint::new(0x3200_0000, CallingConvention::Cdecl32).unwrap();
        let args = StageArgs::Transition(TransitionArgs::default());
        assert_eq!(
            jump.transfer(entry, args),
            HandoffError::UnsupportedConvention(CallingConvention::Cdecl32)
        );
    }

    #[test]
    fn transition_arguments_need_a_32_bit_entry() {
        let mut jump = unsafe { JumpTransfer::new() };
        let entry = EntryPoint::new(0x3200_0000, CallingConvention::SysV64).unwrap();
        let args = StageArgs::Transition(TransitionArgs::default());
        assert_eq!(
            jump.transfer(entry, args),
            HandoffError::ArgumentMismatch(CallingConvention::SysV64)
        );
    }
}
