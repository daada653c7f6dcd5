/// Stop this CPU for good.
pub fn halt() -> ! {
    loop {
        wait_for_interrupt();
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn wait_for_interrupt() {
    // SAFETY: masking interrupts and halting touches no memory.
    unsafe {
        core::arch::asm!("cli", "hlt", options(nomem, nostack));
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn wait_for_interrupt() {
    core::hint::spin_loop();
}
