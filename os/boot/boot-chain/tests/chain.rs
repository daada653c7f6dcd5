use boot_chain::{
    ArgumentSlot, BootHandoff, CallingConvention, ChainConfig, ChainError, ControlTransfer,
    EntryPoint, HandoffError, KernelSource, RecordingTransfer, StageArgs, StageChainer,
    TransitionArgs, enter_kernel,
};
use boot_elf::synth::ImageBuilder;
use boot_elf::{LoadError, LoaderConfig, Validation, WindowMemory};
use boot_info::memory::{AddressWidth, MemoryLayout, PhysicalRegion, ValidatedLayout};
use boot_info::multiboot::{BOOTLOADER_MAGIC, ModuleRange};

const RAM_SIZE: usize = 0x1_0000;
const STUB_BASE: u64 = 0x1000;
const KERNEL_BASE: u64 = 0x3000;
const SCRATCH_BASE: u64 = 0x8000;
const SCRATCH_SIZE: u64 = 0x4000;
const MODULE_AT: u64 = 0xC000;
const INFO_AT: u64 = 0x9500;

fn layout() -> ValidatedLayout {
    MemoryLayout {
        loader: PhysicalRegion::new(0, STUB_BASE),
        transition_stub: PhysicalRegion::new(STUB_BASE, KERNEL_BASE - STUB_BASE),
        kernel: PhysicalRegion::new(KERNEL_BASE, SCRATCH_BASE - KERNEL_BASE),
        module_scratch: PhysicalRegion::new(SCRATCH_BASE, SCRATCH_SIZE),
    }
    .validate(AddressWidth::Bits32)
    .unwrap()
}

fn config(kernel: KernelSource<'_>) -> ChainConfig<'_> {
    ChainConfig::new(LoaderConfig::FLAT_32, layout(), kernel)
}

fn strict(kernel: KernelSource<'_>) -> ChainConfig<'_> {
    ChainConfig::new(
        LoaderConfig::FLAT_32.with_validation(Validation::Strict),
        layout(),
        kernel,
    )
}

fn kernel_image() -> Vec<u8> {
    ImageBuilder::elf64()
        .entry(KERNEL_BASE + 0x10)
        .load(KERNEL_BASE, b"kernel text here", 0x40)
        .build()
}

fn stub_image() -> Vec<u8> {
    ImageBuilder::elf64()
        .entry(STUB_BASE)
        .load(STUB_BASE, &[0xF4; 8], 0x20)
        .build()
}

fn ram_with_module(module: &[u8]) -> (Vec<u8>, ModuleRange) {
    let mut ram = vec![0xAA; RAM_SIZE];
    let start = usize::try_from(MODULE_AT).unwrap();
    ram[start..start + module.len()].copy_from_slice(module);
    let range = ModuleRange::new(MODULE_AT, MODULE_AT + module.len() as u64);
    (ram, range)
}

fn handoff() -> BootHandoff {
    BootHandoff::new(BOOTLOADER_MAGIC, INFO_AT)
}

#[test]
fn zero_modules_are_rejected_without_a_transfer() {
    let mut ram = vec![0xAA; RAM_SIZE];
    let modules: &[ModuleRange] = &[];
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_module(modules, handoff()),
        ChainError::NoModuleAvailable
    );
    assert_eq!(chainer.transfer().calls(), 0);
    drop(chainer);
    assert!(ram.iter().all(|&b| b == 0xAA));
}

#[test]
fn embedded_kernel_is_entered_with_the_handoff_unchanged() {
    let kernel = kernel_image();
    let mut ram = vec![0xAA; RAM_SIZE];
    let mut chainer = StageChainer::new(
        config(KernelSource::Embedded(&kernel)),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_embedded(&kernel, handoff()),
        ChainError::Handoff(HandoffError::StageReturned)
    );

    let record = chainer.transfer().last().unwrap();
    assert_eq!(record.entry.address(), KERNEL_BASE + 0x10);
    assert_eq!(record.entry.convention(), CallingConvention::native());
    assert_eq!(record.args, StageArgs::Boot(handoff()));
    assert_eq!(
        chainer.memory().bytes(KERNEL_BASE, 16).unwrap(),
        b"kernel text here"
    );
    assert_eq!(
        chainer.memory().bytes(KERNEL_BASE + 16, 0x30).unwrap(),
        &[0u8; 0x30][..]
    );
}

#[test]
fn module_kernel_is_staged_and_entered() {
    let kernel = kernel_image();
    let (mut ram, range) = ram_with_module(&kernel);
    let modules = [range];
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_module(&modules[..], handoff()),
        ChainError::Handoff(HandoffError::StageReturned)
    );

    let memory = chainer.memory();
    assert_eq!(
        memory.bytes(SCRATCH_BASE, kernel.len() as u64).unwrap(),
        kernel.as_slice()
    );
    assert_eq!(memory.bytes(KERNEL_BASE, 16).unwrap(), b"kernel text here");
    assert_eq!(
        chainer.transfer().last().unwrap().entry.address(),
        KERNEL_BASE + 0x10
    );
}

#[test]
fn module_is_staged_without_the_byte_past_its_end() {
    let kernel = kernel_image();
    let (mut ram, range) = ram_with_module(&kernel);
    let past_end = usize::try_from(range.end).unwrap();
    ram[past_end] = 0x55;
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    let entry = chainer.load_module(&[range][..]).unwrap();
    assert_eq!(entry.as_u64(), KERNEL_BASE + 0x10);

    let len = range.end - range.start;
    assert_eq!(chainer.memory().bytes(SCRATCH_BASE, len).unwrap(), kernel.as_slice());
    assert_eq!(chainer.memory().bytes(SCRATCH_BASE + len, 1).unwrap(), &[0xAA]);
}

#[test]
fn only_the_first_module_is_used() {
    let kernel = kernel_image();
    let (mut ram, range) = ram_with_module(&kernel);
    let modules = [range, ModuleRange::new(0xF000, 0xF100)];
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    let entry = chainer.load_kernel(&modules[..]).unwrap();
    assert_eq!(entry.as_u64(), KERNEL_BASE + 0x10);
}

#[test]
fn two_stage_chain_calls_the_stub_with_packed_arguments() {
    let kernel = kernel_image();
    let stub = stub_image();
    let (mut ram, range) = ram_with_module(&kernel);
    let modules = [range];
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_two_stage(&stub, &modules[..], handoff()),
        ChainError::Handoff(HandoffError::StageReturned)
    );

    let record = chainer.transfer().last().unwrap();
    assert_eq!(
        record.entry,
        EntryPoint::new(STUB_BASE, CallingConvention::Cdecl32).unwrap()
    );
    assert_eq!(
        record.args,
        StageArgs::Transition(TransitionArgs {
            kernel_entry: 0x3010,
            magic: BOOTLOADER_MAGIC,
            boot_info: 0x9500,
        })
    );
    assert_eq!(chainer.memory().bytes(STUB_BASE, 8).unwrap(), &[0xF4; 8]);
    assert_eq!(chainer.memory().bytes(KERNEL_BASE, 16).unwrap(), b"kernel text here");
}

#[test]
fn two_stage_chain_with_embedded_kernel_ignores_modules() {
    let kernel = kernel_image();
    let stub = stub_image();
    let mut ram = vec![0xAA; RAM_SIZE];
    let modules: &[ModuleRange] = &[];
    let mut chainer = StageChainer::new(
        config(KernelSource::Embedded(&kernel)),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_two_stage(&stub, modules, handoff()),
        ChainError::Handoff(HandoffError::StageReturned)
    );
    assert_eq!(chainer.transfer().calls(), 1);
}

#[test]
fn broken_stub_stops_the_chain_before_the_kernel() {
    let kernel = kernel_image();
    let mut stub = stub_image();
    stub[1] = b'X';
    let (mut ram, range) = ram_with_module(&kernel);
    let modules = [range];
    let mut chainer = StageChainer::new(
        config(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.chain_two_stage(&stub, &modules[..], handoff()),
        ChainError::Load(LoadError::NotAnElfImage)
    );
    assert_eq!(chainer.transfer().calls(), 0);
    assert_eq!(chainer.memory().bytes(SCRATCH_BASE, 4).unwrap(), &[0xAA; 4]);
}

#[test]
fn boot_info_above_4_gib_cannot_cross_the_32_bit_hop() {
    let kernel = kernel_image();
    let stub = stub_image();
    let mut ram = vec![0xAA; RAM_SIZE];
    let modules: &[ModuleRange] = &[];
    let mut chainer = StageChainer::new(
        config(KernelSource::Embedded(&kernel)),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    let handoff = BootHandoff::new(BOOTLOADER_MAGIC, 0x1_0000_0000);
    assert_eq!(
        chainer.chain_two_stage(&stub, modules, handoff),
        ChainError::Handoff(HandoffError::DoesNotFit {
            slot: ArgumentSlot::BootInfo,
            value: 0x1_0000_0000
        })
    );
    assert_eq!(chainer.transfer().calls(), 0);
}

#[test]
fn strict_chain_rejects_modules_larger_than_scratch() {
    let mut ram = vec![0xAA; RAM_SIZE];
    let modules = [ModuleRange::new(0x1000, 0x1000 + SCRATCH_SIZE + 1)];
    let mut chainer = StageChainer::new(
        strict(KernelSource::Module),
        WindowMemory::new(0, &mut ram),
        RecordingTransfer::new(),
    );

    assert_eq!(
        chainer.load_module(&modules[..]),
        Err(ChainError::ModuleTooLarge {
            len: SCRATCH_SIZE + 1,
            capacity: SCRATCH_SIZE
        })
    );
    assert_eq!(chainer.memory().bytes(SCRATCH_BASE, 4).unwrap(), &[0xAA; 4]);
}

#[test]
fn stub_widens_arguments_for_the_kernel() {
    for (entry, info) in [(1u32, 0u32), (u32::MAX, u32::MAX), (0x10_0000, 0x9500)] {
        let mut transfer = RecordingTransfer::new();
        let args = TransitionArgs {
            kernel_entry: entry,
            magic: BOOTLOADER_MAGIC,
            boot_info: info,
        };

        assert_eq!(
            enter_kernel(&mut transfer, args),
            HandoffError::StageReturned
        );

        let record = transfer.last().unwrap();
        assert_eq!(record.entry.address(), u64::from(entry));
        assert_eq!(record.entry.convention(), CallingConvention::SysV64);
        assert_eq!(
            record.args,
            StageArgs::Boot(BootHandoff::new(BOOTLOADER_MAGIC, u64::from(info)))
        );
    }
}

#[test]
fn stub_refuses_a_null_kernel_entry() {
    let mut transfer = RecordingTransfer::new();
    let args = TransitionArgs {
        kernel_entry: 0,
        magic: BOOTLOADER_MAGIC,
        boot_info: 0x9500,
    };
    assert_eq!(enter_kernel(&mut transfer, args), HandoffError::NullEntry);
    assert_eq!(transfer.calls(), 0);
}

#[test]
fn transfers_can_be_driven_through_a_trait_object() {
    let mut transfer = RecordingTransfer::new();
    let dynamic: &mut dyn ControlTransfer = &mut transfer;
    let args = TransitionArgs::pack(0x3010, handoff()).unwrap();
    assert_eq!(enter_kernel(dynamic, args), HandoffError::StageReturned);
    assert_eq!(transfer.calls(), 1);
}
