//! Architecture boundary.
//!
//! Everything the spec calls out as "out of scope, specified as a
//! contract" — register save/restore, the bootstrap trampoline, timer
//! programming — lives behind this module. The rest of the crate only
//! calls the functions re-exported here; it never reaches into `avr`
//! directly, which keeps the scheduler and public API portable to a host
//! build for the unit tests in §10's test-tooling expansion.

#[cfg(target_arch = "avr")]
pub mod avr;

#[cfg(target_arch = "avr")]
pub use avr::{
    bootstrap_trampoline, cpu_idle, disable_interrupts, enable_interrupts, interrupts_enabled,
    switch_context, switch_context_without_save, timer_init,
};

/// Stand-ins used when this crate is built for the host (the normal case
/// for `cargo test`, since `.cargo/config.toml` otherwise defaults the
/// target to AVR). None of the scheduler or public-API logic under test
/// touches real interrupt hardware, so these just track enabled/disabled
/// state well enough for `with_interrupts_disabled` to nest correctly.
#[cfg(not(target_arch = "avr"))]
pub mod host {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn interrupts_enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    pub fn disable_interrupts() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn enable_interrupts() {
        ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn cpu_idle() {
        core::hint::spin_loop();
    }

    /// Never invoked on the host. `bootstrap::write_initial_frame` takes
    /// this function's address as a plain value so its unit tests can run
    /// without an AVR target; nothing on the host ever jumps to it.
    pub extern "C" fn bootstrap_trampoline() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    /// Host stand-ins for the naked switch primitives. There is no real
    /// stack to swap on the host, so these just drive the same Rust-side
    /// scheduling functions the AVR asm calls, without installing the
    /// returned stack pointer anywhere. Exercised only incidentally (no
    /// host unit test calls `yield_now` directly); present so the crate
    /// compiles for `cargo test` without the AVR target.
    ///
    /// # Safety
    /// Matches `arch::avr`'s versions: callable only from thread context
    /// with `SLOTS`/scheduler state already initialized.
    pub unsafe fn switch_context() {
        let _ = crate::scheduler::schedule_from_yield(core::ptr::null_mut());
    }

    pub unsafe extern "C" fn switch_context_without_save() -> ! {
        let _ = crate::scheduler::schedule_without_save();
        loop {
            core::hint::spin_loop();
        }
    }
}

#[cfg(not(target_arch = "avr"))]
pub use host::{
    bootstrap_trampoline, cpu_idle, disable_interrupts, enable_interrupts, interrupts_enabled,
    switch_context, switch_context_without_save,
};

/// Runs `f` with interrupts masked, restoring the prior enabled/disabled
/// state on return (not unconditionally re-enabling), per §4.1's rule that
/// mutating `sleeping` outside the ISR needs interrupt discipline without
/// clobbering a caller that was already inside its own critical section.
#[inline]
pub fn with_interrupts_disabled<R>(f: impl FnOnce() -> R) -> R {
    let was_enabled = interrupts_enabled();
    disable_interrupts();
    let result = f();
    if was_enabled {
        enable_interrupts();
    }
    result
}
