use boot_elf::LoaderConfig;
use boot_info::memory::ValidatedLayout;

/// Where the kernel image comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KernelSource<'a> {
    /// Linked into the loading stage.
    Embedded(&'a [u8]),
    /// The first boot module, copied to the module scratch region first.
    Module,
}

/// Everything a [`StageChainer`](crate::StageChainer) is parameterized over.
#[derive(Debug, Copy, Clone)]
pub struct ChainConfig<'a> {
    pub loader: LoaderConfig,
    pub layout: ValidatedLayout,
    pub kernel: KernelSource<'a>,
}

impl<'a> ChainConfig<'a> {
    #[must_use]
    pub const fn new(loader: LoaderConfig, layout: ValidatedLayout, kernel: KernelSource<'a>) -> Self {
        Self {
            loader,
            layout,
            kernel,
        }
    }
}
