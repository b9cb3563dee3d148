//! The 1 ms tick ISR and the system millisecond counter (§4.5).
//!
//! `on_tick` is the logic; it is plain, host-testable Rust. The
//! `#[avr_device::interrupt]`-attributed function below it is the thin
//! on-target wiring — `avr-device` generates the vector table entry and
//! the full prologue/epilogue for us, which is why this ISR (unlike the
//! cooperative switch) needs no hand-written assembly: it always runs to
//! completion and never touches the stack pointer.

use crate::arch;
use crate::config::MAX_THREADS;
use crate::thread::{ThreadId, SLOTS};

static mut MILLIS: u32 = 0;

/// Atomic snapshot of the 32-bit system counter (§3, "external reads take
/// an atomic snapshot"). A plain load would not be atomic on an 8-bit
/// core for a multi-byte value, hence the interrupt mask.
pub fn millis() -> u32 {
    arch::with_interrupts_disabled(|| unsafe { MILLIS })
}

pub(crate) fn reset() {
    unsafe { MILLIS = 0 };
}

/// The tick body (§4.5, steps 1-4). Kept free of any dependency on
/// `avr-device` so it can run under a host unit test.
fn on_tick() {
    unsafe { MILLIS = MILLIS.wrapping_add(1) };

    let mut snapshot = crate::scheduler::sleeping_snapshot();
    for i in 0..MAX_THREADS {
        if snapshot.is_empty() {
            break;
        }
        let id = ThreadId(i as u8);
        let mask = id.mask();
        if snapshot.contains(mask) {
            unsafe {
                let counter = &mut SLOTS[i].sleep_counter;
                *counter -= 1;
                if *counter == 0 {
                    snapshot.remove(mask);
                }
            }
        }
    }
    crate::scheduler::set_sleeping(snapshot);
}

/// Compare-match A on Timer/Counter0, programmed by `arch::avr::timer_init`
/// for a 1 ms period. Never invokes the scheduler (§4.5): wake-ups become
/// visible the next time something yields or the scheduler re-selects.
#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega328p)]
fn TIMER0_COMPA() {
    on_tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler;

    #[test]
    fn millis_advances_by_one_per_tick() {
        reset();
        on_tick();
        on_tick();
        on_tick();
        assert_eq!(millis(), 3);
    }

    #[test]
    fn decrements_sleep_counters_and_clears_bit_on_zero() {
        scheduler::reset(ThreadId(0));
        scheduler::begin_sleep(ThreadId(1), 2);

        on_tick();
        assert!(scheduler::thread_sleeping(ThreadId(1)));
        assert_eq!(unsafe { SLOTS[1].sleep_counter }, 1);

        on_tick();
        assert!(!scheduler::thread_sleeping(ThreadId(1)));
        assert_eq!(unsafe { SLOTS[1].sleep_counter }, 0);
    }

    #[test]
    fn walk_stops_early_once_snapshot_is_empty() {
        scheduler::reset(ThreadId(0));
        unsafe {
            SLOTS[0].sleep_counter = 0;
        }
        // No slot sleeping: on_tick's loop should break on the first
        // `is_empty` check and touch no counters.
        on_tick();
        assert_eq!(unsafe { SLOTS[0].sleep_counter }, 0);
    }
}
