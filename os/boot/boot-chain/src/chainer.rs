use crate::config::{ChainConfig, KernelSource};
use crate::entry::{CallingConvention, EntryPoint};
use crate::error::ChainError;
use crate::handoff::{BootHandoff, HandoffError, StageArgs, TransitionArgs};
use crate::transfer::ControlTransfer;
use boot_elf::{EntryAddress, PhysicalMemory, SegmentLoader};
use boot_info::multiboot::BootModules;
use log::{debug, error, info};

/// Loads stages into physical memory and transfers control to them.
///
/// Methods named `chain_*` end in a control transfer. They return only when
/// no transfer was attempted or the transferred-to stage came back; either way
/// the returned [`ChainError`] says why.
pub struct StageChainer<'a, M, T> {
    config: ChainConfig<'a>,
    memory: M,
    transfer: T,
}

impl<'a, M, T> StageChainer<'a, M, T>
where
    M: PhysicalMemory,
    T: ControlTransfer,
{
    #[must_use]
    pub const fn new(config: ChainConfig<'a>, memory: M, transfer: T) -> Self {
        Self {
            config,
            memory,
            transfer,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ChainConfig<'a> {
        &self.config
    }

    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    #[must_use]
    pub const fn transfer(&self) -> &T {
        &self.transfer
    }

    #[must_use]
    pub fn into_parts(self) -> (M, T) {
        (self.memory, self.transfer)
    }

    const fn loader(&self) -> SegmentLoader {
        SegmentLoader::new(self.config.loader)
    }

    /// Load an image linked into the running stage.
    ///
    /// # Errors
    /// Any [`LoadError`](boot_elf::LoadError) of the segment loader.
    pub fn load_embedded(&mut self, image: &[u8]) -> Result<EntryAddress, ChainError> {
        debug!("Loading embedded image of {} bytes", image.len());
        Ok(self.loader().load(image, &mut self.memory)?)
    }

    /// Copy the first boot module to the module scratch region and load it
    /// from there.
    ///
    /// # Errors
    /// * [`ChainError::NoModuleAvailable`] if there is no module. Nothing is
    ///   copied.
    /// * [`ChainError::ModuleTooLarge`] under strict validation if the module
    ///   does not fit the scratch region.
    /// * Any [`LoadError`](boot_elf::LoadError) of the copy or the load.
    pub fn load_module<B>(&mut self, modules: &B) -> Result<EntryAddress, ChainError>
    where
        B: BootModules + ?Sized,
    {
        let module = modules.first_module().ok_or(ChainError::NoModuleAvailable)?;
        let scratch = self.config.layout.module_scratch();
        let len = module.len();

        if self.config.loader.validation.is_strict() && len > scratch.len() {
            return Err(ChainError::ModuleTooLarge {
                len,
                capacity: scratch.len(),
            });
        }

        info!(
            "Staging module {:#x}..{:#x} ({len} bytes) at {:#x}",
            module.start,
            module.end,
            scratch.start()
        );
        self.memory.copy_within(scratch.start(), module.start, len)?;

        // SAFETY: the view is only read while loading; the validated layout
        // keeps the scratch region apart from every region the loader writes.
        let image = unsafe { self.memory.image_at(scratch.start(), len)? };
        Ok(self.loader().load(&image, &mut self.memory)?)
    }

    /// Load the kernel from the configured [`KernelSource`].
    ///
    /// # Errors
    /// See [`load_embedded`](Self::load_embedded) and
    /// [`load_module`](Self::load_module).
    pub fn load_kernel<B>(&mut self, modules: &B) -> Result<EntryAddress, ChainError>
    where
        B: BootModules + ?Sized,
    {
        match self.config.kernel {
            KernelSource::Embedded(image) => self.load_embedded(image),
            KernelSource::Module => self.load_module(modules),
        }
    }

    /// Load an embedded kernel and jump to it, forwarding `handoff`.
    #[must_use]
    pub fn chain_embedded(&mut self, image: &[u8], handoff: BootHandoff) -> ChainError {
        match self.load_embedded(image) {
            Ok(entry) => self.enter(entry, handoff),
            Err(e) => e,
        }
    }

    /// Load the kernel from the first boot module and jump to it, forwarding
    /// `handoff`.
    #[must_use]
    pub fn chain_module<B>(&mut self, modules: &B, handoff: BootHandoff) -> ChainError
    where
        B: BootModules + ?Sized,
    {
        match self.load_module(modules) {
            Ok(entry) => self.enter(entry, handoff),
            Err(e) => e,
        }
    }

    /// Load the transition stub and the kernel, then call the stub with the
    /// kernel entry and `handoff` narrowed to 32 bits.
    #[must_use]
    pub fn chain_two_stage<B>(&mut self, stub: &[u8], modules: &B, handoff: BootHandoff) -> ChainError
    where
        B: BootModules + ?Sized,
    {
        let prepared = self.prepare_two_stage(stub, modules, handoff);
        match prepared {
            Ok((entry, args)) => self.jump(entry, StageArgs::Transition(args)),
            Err(e) => {
                error!("Two-stage chain aborted: {e}");
                e
            }
        }
    }

    fn prepare_two_stage<B>(
        &mut self,
        stub: &[u8],
        modules: &B,
        handoff: BootHandoff,
    ) -> Result<(EntryPoint, TransitionArgs), ChainError>
    where
        B: BootModules + ?Sized,
    {
        let stub_entry = self.load_embedded(stub)?;
        let stub_entry = EntryPoint::new(stub_entry.as_u64(), CallingConvention::Cdecl32)?;
        info!("Transition stub loaded, entry {stub_entry}");

        let kernel_entry = self.load_kernel(modules)?;
        info!("Kernel loaded, entry {kernel_entry}");

        let args = TransitionArgs::pack(kernel_entry.as_u64(), handoff)?;
        Ok((stub_entry, args))
    }

    fn enter(&mut self, entry: EntryAddress, handoff: BootHandoff) -> ChainError {
        match EntryPoint::new(entry.as_u64(), CallingConvention::native()) {
            Ok(entry) => self.jump(entry, StageArgs::Boot(handoff)),
            Err(e) => e.into(),
        }
    }

    fn jump(&mut self, entry: EntryPoint, args: StageArgs) -> ChainError {
        let e = self.transfer.transfer(entry, args);
        error!("Control transfer to {entry} failed: {e}");
        e.into()
    }
}

/// The transition stub's side of the hop: widen `args` and call the kernel
/// as a 64-bit function.
///
/// Returns only if the transfer failed.
#[must_use]
pub fn enter_kernel<T>(transfer: &mut T, args: TransitionArgs) -> HandoffError
where
    T: ControlTransfer + ?Sized,
{
    let (kernel_entry, handoff) = args.unpack();
    match EntryPoint::new(kernel_entry, CallingConvention::SysV64) {
        Ok(entry) => transfer.transfer(entry, StageArgs::Boot(handoff)),
        Err(e) => e,
    }
}
