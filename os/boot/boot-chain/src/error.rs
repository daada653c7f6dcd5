use crate::handoff::HandoffError;
use boot_elf::LoadError;
use boot_info::memory::LayoutError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("Failed to load a stage: {0}")]
    Load(#[from] LoadError),
    #[error("Failed to hand over control: {0}")]
    Handoff(#[from] HandoffError),
    #[error("Invalid memory layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("The bootloader provided no module to load the kernel from")]
    NoModuleAvailable,
    #[error("The kernel module ({len:#x} bytes) exceeds the scratch region ({capacity:#x} bytes)")]
    ModuleTooLarge { len: u64, capacity: u64 },
}
