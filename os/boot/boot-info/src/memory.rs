//! # Static Physical Memory Layout
//!
//! Every stage of the chain writes to fixed physical addresses. Nothing checks
//! at runtime whether a copy clobbers code or data that a later step still
//! needs, so the regions are described once here and validated once at
//! startup.

use core::fmt;

/// Physical base of the kernel image (the kernel is linked for 1 MiB).
pub const KERNEL_PHYS_BASE: u64 = 0x0010_0000;

/// Physical base of the 64-bit transition stub.
pub const STUB_PHYS_BASE: u64 = 0x0320_0000;

/// Physical base of the Multiboot stage itself.
pub const LOADER_PHYS_BASE: u64 = 0x0330_0000;

/// Physical base of the area boot modules are staged into before loading.
pub const MODULE_SCRATCH_BASE: u64 = 100 << 20;

/// Size of the module staging area.
pub const MODULE_SCRATCH_SIZE: u64 = 64 << 20;

/// The layout used by the stage binaries.
pub const DEFAULT_LAYOUT: MemoryLayout = MemoryLayout {
    kernel: PhysicalRegion::new(KERNEL_PHYS_BASE, STUB_PHYS_BASE - KERNEL_PHYS_BASE),
    transition_stub: PhysicalRegion::new(STUB_PHYS_BASE, LOADER_PHYS_BASE - STUB_PHYS_BASE),
    loader: PhysicalRegion::new(LOADER_PHYS_BASE, 32 << 20),
    module_scratch: PhysicalRegion::new(MODULE_SCRATCH_BASE, MODULE_SCRATCH_SIZE),
};

/// Pointer width of the code that dereferences a physical address.
///
/// In 32-bit flat protected mode only the low 4 GiB are reachable; in long mode
/// (identity mapped) the full 64-bit range is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddressWidth {
    Bits32,
    Bits64,
}

impl AddressWidth {
    /// The pointer width of the running code.
    #[must_use]
    pub const fn native() -> Self {
        if size_of::<usize>() == size_of::<u32>() {
            Self::Bits32
        } else {
            Self::Bits64
        }
    }

    /// Highest address representable at this width.
    #[must_use]
    pub const fn max_address(self) -> u64 {
        match self {
            Self::Bits32 => u32::MAX as u64,
            Self::Bits64 => u64::MAX,
        }
    }

    #[must_use]
    pub const fn can_represent(self, address: u64) -> bool {
        address <= self.max_address()
    }

    /// Truncate an address to this width, exactly like a pointer cast would.
    #[must_use]
    pub const fn truncate(self, address: u64) -> u64 {
        address & self.max_address()
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

impl fmt::Display for AddressWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// A contiguous physical address range `[start, start + len)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalRegion {
    start: u64,
    len: u64,
}

impl PhysicalRegion {
    #[must_use]
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exclusive end address, or `None` if the region wraps the address space.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.start.checked_add(self.len)
    }

    /// Whether `[start, start + len)` lies entirely within this region.
    #[must_use]
    pub const fn contains_range(&self, start: u64, len: u64) -> bool {
        let (Some(end), Some(own_end)) = (start.checked_add(len), self.end()) else {
            return false;
        };
        start >= self.start && end <= own_end
    }

    #[must_use]
    pub const fn contains_region(&self, other: &Self) -> bool {
        self.contains_range(other.start, other.len)
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let self_end = match self.end() {
            Some(end) => end,
            None => u64::MAX,
        };
        let other_end = match other.end() {
            Some(end) => end,
            None => u64::MAX,
        };
        self.start < other_end && other.start < self_end
    }

    /// Whether the last byte of the region is addressable at `width`.
    #[must_use]
    pub const fn fits(&self, width: AddressWidth) -> bool {
        match self.end() {
            Some(end) => self.is_empty() || width.can_represent(end - 1),
            None => false,
        }
    }
}

impl fmt::Display for PhysicalRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.start.wrapping_add(self.len))
    }
}

/// Names the regions of a [`MemoryLayout`] in diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegionKind {
    Loader,
    TransitionStub,
    Kernel,
    ModuleScratch,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loader => "loader",
            Self::TransitionStub => "transition stub",
            Self::Kernel => "kernel",
            Self::ModuleScratch => "module scratch",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("the {0} region is empty")]
    EmptyRegion(RegionKind),
    #[error("the {0} region wraps around the address space")]
    Wraps(RegionKind),
    #[error("the {0} region is not addressable with {1} pointers")]
    NotAddressable(RegionKind, AddressWidth),
    #[error("the {0} region overlaps the {1} region")]
    Overlap(RegionKind, RegionKind),
    #[error("the {0} region is not backed by available RAM")]
    NotAvailable(RegionKind),
}

/// The static memory map shared by all stages.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    /// Where the Multiboot stage (and anything embedded in it) lives.
    pub loader: PhysicalRegion,
    /// Where the 64-bit transition stub is linked.
    pub transition_stub: PhysicalRegion,
    /// The span the kernel's loadable segments are linked into.
    pub kernel: PhysicalRegion,
    /// Where a boot module is copied to before its segments are loaded.
    pub module_scratch: PhysicalRegion,
}

impl MemoryLayout {
    const fn regions(&self) -> [(RegionKind, PhysicalRegion); 4] {
        [
            (RegionKind::Loader, self.loader),
            (RegionKind::TransitionStub, self.transition_stub),
            (RegionKind::Kernel, self.kernel),
            (RegionKind::ModuleScratch, self.module_scratch),
        ]
    }

    /// Check that every region is non-empty, addressable at `width`, and that no
    /// two regions overlap.
    ///
    /// # Errors
    /// The first violated constraint, as a [`LayoutError`].
    pub fn validate(self, width: AddressWidth) -> Result<ValidatedLayout, LayoutError> {
        let regions = self.regions();
        for (kind, region) in regions {
            if region.is_empty() {
                return Err(LayoutError::EmptyRegion(kind));
            }
            if region.end().is_none() {
                return Err(LayoutError::Wraps(kind));
            }
            if !region.fits(width) {
                return Err(LayoutError::NotAddressable(kind, width));
            }
        }

        for (i, (first_kind, first)) in regions.iter().enumerate() {
            for (second_kind, second) in &regions[i + 1..] {
                if first.overlaps(second) {
                    return Err(LayoutError::Overlap(*first_kind, *second_kind));
                }
            }
        }

        Ok(ValidatedLayout { layout: self, width })
    }
}

/// A [`MemoryLayout`] that passed [`MemoryLayout::validate`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ValidatedLayout {
    layout: MemoryLayout,
    width: AddressWidth,
}

impl ValidatedLayout {
    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[must_use]
    pub const fn width(&self) -> AddressWidth {
        self.width
    }

    #[must_use]
    pub const fn module_scratch(&self) -> PhysicalRegion {
        self.layout.module_scratch
    }

    /// Confirm the regions the chain writes to are backed by RAM the firmware
    /// reported as available.
    ///
    /// The loader region is skipped; the bootloader already placed it.
    ///
    /// # Errors
    /// [`LayoutError::NotAvailable`] for the first region not contained in any
    /// single available range.
    pub fn confirm_available<I>(&self, available: I) -> Result<(), LayoutError>
    where
        I: IntoIterator<Item = PhysicalRegion>,
        I::IntoIter: Clone,
    {
        let available = available.into_iter();
        for (kind, region) in self.layout.regions() {
            if kind == RegionKind::Loader {
                continue;
            }
            if !available.clone().any(|ram| ram.contains_region(&region)) {
                return Err(LayoutError::NotAvailable(kind));
            }
        }
        Ok(())
    }
}
