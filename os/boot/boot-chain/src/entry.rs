use crate::handoff::HandoffError;
use boot_info::memory::AddressWidth;
use core::fmt;

/// How a stage expects to be called.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CallingConvention {
    /// 32-bit protected mode, arguments on the stack.
    Cdecl32,
    /// 64-bit long mode, arguments in `rdi`, `rsi`, `rdx`.
    SysV64,
}

impl CallingConvention {
    /// The convention of a function compiled for the running target.
    #[must_use]
    pub const fn native() -> Self {
        match AddressWidth::native() {
            AddressWidth::Bits32 => Self::Cdecl32,
            AddressWidth::Bits64 => Self::SysV64,
        }
    }

    /// Pointer width of code using this convention.
    #[must_use]
    pub const fn width(self) -> AddressWidth {
        match self {
            Self::Cdecl32 => AddressWidth::Bits32,
            Self::SysV64 => AddressWidth::Bits64,
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cdecl32 => "cdecl (32-bit)",
            Self::SysV64 => "sysv64",
        })
    }
}

/// An address that may be jumped to, tagged with how to call it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct EntryPoint {
    address: u64,
    convention: CallingConvention,
}

impl EntryPoint {
    /// # Errors
    /// * [`HandoffError::NullEntry`] for address zero.
    /// * [`HandoffError::EntryTooWide`] if the address does not fit the
    ///   convention's pointer width.
    pub const fn new(address: u64, convention: CallingConvention) -> Result<Self, HandoffError> {
        if address == 0 {
            return Err(HandoffError::NullEntry);
        }
        if !convention.width().can_represent(address) {
            return Err(HandoffError::EntryTooWide {
                address,
                convention,
            });
        }
        Ok(Self {
            address,
            convention,
        })
    }

    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    #[must_use]
    pub const fn convention(&self) -> CallingConvention {
        self.convention
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} ({})", self.address, self.convention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_and_wide_addresses() {
        assert_eq!(
            EntryPoint::new(0, CallingConvention::SysV64),
            Err(HandoffError::NullEntry)
        );
        assert_eq!(
            EntryPoint::new(0x1_0000_0000, CallingConvention::Cdecl32),
            Err(HandoffError::EntryTooWide {
                address: 0x1_0000_0000,
                convention: CallingConvention::Cdecl32
            })
        );
        let entry = EntryPoint::new(0x1_0000_0000, CallingConvention::SysV64).unwrap();
        assert_eq!(entry.address(), 0x1_0000_0000);
        assert!(EntryPoint::new(u64::from(u32::MAX), CallingConvention::Cdecl32).is_ok());
    }

    #[test]
    fn native_convention_matches_pointer_width() {
        assert_eq!(
            CallingConvention::native().width(),
            AddressWidth::native()
        );
    }
}
