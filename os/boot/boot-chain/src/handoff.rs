//! Values carried from one stage to the next.

use crate::entry::CallingConvention;
use core::fmt;

/// What the kernel receives: the bootloader magic and the address of the boot
/// information structure, both forwarded unchanged.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BootHandoff {
    pub magic: u32,
    pub boot_info: u64,
}

impl BootHandoff {
    #[must_use]
    pub const fn new(magic: u32, boot_info: u64) -> Self {
        Self { magic, boot_info }
    }
}

/// The three 32-bit argument slots of the call into the transition stub.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TransitionArgs {
    pub kernel_entry: u32,
    pub magic: u32,
    pub boot_info: u32,
}

impl TransitionArgs {
    /// Narrow the kernel entry and handoff to 32-bit slots.
    ///
    /// # Errors
    /// [`HandoffError::DoesNotFit`] naming the first value above `u32::MAX`.
    pub fn pack(kernel_entry: u64, handoff: BootHandoff) -> Result<Self, HandoffError> {
        Ok(Self {
            kernel_entry: narrow(ArgumentSlot::KernelEntry, kernel_entry)?,
            magic: handoff.magic,
            boot_info: narrow(ArgumentSlot::BootInfo, handoff.boot_info)?,
        })
    }

    /// Widen the slots by zero extension.
    #[must_use]
    pub fn unpack(self) -> (u64, BootHandoff) {
        (
            u64::from(self.kernel_entry),
            BootHandoff::new(self.magic, u64::from(self.boot_info)),
        )
    }
}

fn narrow(slot: ArgumentSlot, value: u64) -> Result<u32, HandoffError> {
    u32::try_from(value).map_err(|_| HandoffError::DoesNotFit { slot, value })
}

/// Arguments of a control transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StageArgs {
    /// Into the transition stub.
    Transition(TransitionArgs),
    /// Into the kernel.
    Boot(BootHandoff),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ArgumentSlot {
    KernelEntry,
    BootInfo,
}

impl fmt::Display for ArgumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KernelEntry => "kernel entry",
            Self::BootInfo => "boot information address",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum HandoffError {
    #[error("Refusing to jump to address 0")]
    NullEntry,
    #[error("Entry point {address:#x} is not addressable for a {convention} call")]
    EntryTooWide {
        address: u64,
        convention: CallingConvention,
    },
    #[error("The {slot} {value:#x} does not fit a 32-bit argument")]
    DoesNotFit { slot: ArgumentSlot, value: u64 },
    #[error("Cannot perform a {0} call from this architecture")]
    UnsupportedConvention(CallingConvention),
    #[error("A {0} entry point does not take these arguments")]
    ArgumentMismatch(CallingConvention),
    #[error("The next stage returned control")]
    StageReturned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact_up_to_u32_max() {
        for value in [0, 1, 0x10_0000, u64::from(u32::MAX)] {
            let handoff = BootHandoff::new(0x2BAD_B002, value);
            let args = TransitionArgs::pack(value, handoff).unwrap();
            assert_eq!(args.unpack(), (value, handoff));
        }
    }

    #[test]
    fn wide_values_do_not_pack() {
        let handoff = BootHandoff::new(0x2BAD_B002, 0x9000);
        assert_eq!(
            TransitionArgs::pack(0x1_0000_0000, handoff),
            Err(HandoffError::DoesNotFit {
                slot: ArgumentSlot::KernelEntry,
                value: 0x1_0000_0000
            })
        );
        let handoff = BootHandoff::new(0x2BAD_B002, 0x1_0000_9000);
        assert!(matches!(
            TransitionArgs::pack(0x10_0000, handoff),
            Err(HandoffError::DoesNotFit {
                slot: ArgumentSlot::BootInfo,
                ..
            })
        ));
    }
}
