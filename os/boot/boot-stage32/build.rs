use boot_info::memory;
use std::{env, fs, path::Path, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let ld = manifest_dir.join("stage32.ld");

    let loader_base = memory::LOADER_PHYS_BASE;
    assert_eq!(
        loader_base & 0xfff,
        0,
        "LOADER_PHYS_BASE must be 4 KiB aligned (got {loader_base:#x})"
    );
    assert!(
        loader_base < memory::MODULE_SCRATCH_BASE,
        "the loader must sit below the module scratch region"
    );

    println!("cargo:rerun-if-changed={}", ld.display());
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--defsym=LOADER_BASE={loader_base:#x}");

    embed(&out_dir, "BOOT_STAGE64_ELF", "boot-stage64.elf");
    if env::var_os("CARGO_FEATURE_EMBEDDED_KERNEL").is_some() {
        embed(&out_dir, "BOOT_KERNEL_ELF", "kernel.elf");
    }
}

/// Copy the ELF named by `var` into `OUT_DIR` for `include_bytes!`.
///
/// Without it an empty file is embedded; loading it fails at boot with a
/// "not an ELF image" error instead of failing the build.
fn embed(out_dir: &Path, var: &str, name: &str) {
    println!("cargo:rerun-if-env-changed={var}");
    let target = out_dir.join(name);
    if let Some(source) = env::var_os(var) {
        println!("cargo:rerun-if-changed={}", Path::new(&source).display());
        fs::copy(&source, &target)
            .unwrap_or_else(|e| panic!("failed to copy {var} ({source:?}): {e}"));
    } else {
        println!("cargo:warning={var} is not set; embedding an empty {name}");
        fs::write(&target, []).unwrap();
    }
}
