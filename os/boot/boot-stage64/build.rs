use boot_info::memory;
use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("stage64.ld");

    let stub_base = memory::STUB_PHYS_BASE;
    assert_eq!(
        stub_base & 0xfff,
        0,
        "STUB_PHYS_BASE must be 4 KiB aligned (got {stub_base:#x})"
    );
    assert!(
        stub_base + memory::DEFAULT_LAYOUT.transition_stub.len() <= 1 << 32,
        "the transition stub must be reachable from 32-bit code"
    );

    println!("cargo:rerun-if-changed={}", ld.display());
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--defsym=STUB_BASE={stub_base:#x}");
}
