//! One-shot boot sequence (§4.6), step-numbered the way the teacher's
//! `kstart()` is, narrowed to this core's own steps. Runs once, before
//! application code, and leaves global interrupts disabled — the
//! application enables them when it is ready for the tick to start
//! firing.

use crate::arch;
use crate::config::{self, MAX_THREADS};
use crate::scheduler;
use crate::thread::{ThreadId, SLOTS};

#[cfg(feature = "stack-canary")]
use crate::config::{canary, STACKS};

/// Runs the boot sequence and hands control back to the caller, which
/// then runs as thread 0. Must be called exactly once, before any other
/// API function, with global interrupts still disabled.
pub fn run(peripherals: &avr_device::atmega328p::Peripherals) {
    // Step 1: logging first, so every later step can log.
    crate::logger::init();
    log::info!("cokernel: starting");

    // Step 2: seed each slot's saved stack pointer at its base (no frame
    // yet — only slot 0 is runnable, and it is already running on the
    // hardware stack, not a saved one).
    for id in 0..MAX_THREADS {
        unsafe {
            SLOTS[id].sp = config::stack_base(id);
            SLOTS[id].sleep_counter = 0;
        }
    }

    // Step 3: optional canary seeding.
    #[cfg(feature = "stack-canary")]
    unsafe {
        for id in 0..MAX_THREADS {
            for offset in 0..canary::CANARY_WIDTH {
                STACKS[id][offset] = canary::SENTINEL;
            }
        }
    }

    // Step 4: bitsets and current-thread fields — slot 0 is the sole
    // runnable slot, every other slot starts disabled.
    scheduler::reset(ThreadId::INITIAL);

    // Step 5: zero the system counter.
    crate::tick::reset();

    // Step 6: arm the 1 ms timer. Its interrupt is enabled at the
    // peripheral, but the application has not yet set the global
    // interrupt flag, so it cannot fire until `arch::enable_interrupts`
    // is called from application code.
    arch::timer_init(&peripherals.TC0);

    log::info!("cokernel: init complete, {} slot(s) configured", MAX_THREADS);
}
