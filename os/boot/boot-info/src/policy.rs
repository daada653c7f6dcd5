//! # Validation Policy

/// How much the boot chain checks its inputs.
///
/// The images handled by the loader are produced by the same build that
/// produces the loader, so [`Trusted`](Self::Trusted) performs only the ELF
/// magic check. [`Strict`](Self::Strict) reuses the identical copy/zero logic
/// with every offset, size and address verified before use.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Validation {
    /// Magic check only; malformed tables or addresses are undefined behavior.
    #[default]
    Trusted,
    /// Bounds, encoding, width and capacity checks on every input.
    Strict,
}

impl Validation {
    #[inline]
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}
