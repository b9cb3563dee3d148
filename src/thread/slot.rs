//! Per-slot runtime data: the saved stack pointer and the 16-bit sleep
//! counter (§3 "Per-slot data"). Stack base/size are compile-time (see
//! `config`); this module only holds what changes at runtime.

use crate::config::MAX_THREADS;

/// Runtime state owned by one thread slot. `sp` is meaningless while the
/// slot is `disabled`; `sleep_counter` is meaningless unless the slot's bit
/// is set in the kernel's `sleeping` set (invariant I3).
#[derive(Clone, Copy)]
pub struct Slot {
    /// Saved stack pointer: where this thread's register frame lives while
    /// it is not running. Written by `create()` and by the context switch;
    /// read only by the context switch.
    pub sp: *mut u8,
    /// Milliseconds remaining before this slot's `sleeping` bit is cleared
    /// by the tick ISR. Multi-byte, so writes from thread context happen
    /// inside a critical section (§4.1).
    pub sleep_counter: u16,
}

impl Slot {
    pub const fn empty() -> Slot {
        Slot { sp: core::ptr::null_mut(), sleep_counter: 0 }
    }
}

// SAFETY: `Slot` instances only ever live inside `SLOTS`, which is accessed
// exclusively through `scheduler::with_state` (interrupt-masked critical
// sections on a single core). The raw pointer is never dereferenced as
// Rust-typed data outside the context-switch assembly.
unsafe impl Send for Slot {}

/// The fixed-size table of per-slot runtime state. Always accessed via
/// `scheduler::with_state`, never directly.
pub static mut SLOTS: [Slot; MAX_THREADS] = [Slot::empty(); MAX_THREADS];

#[cfg(feature = "stack-canary")]
pub fn canary_intact(id: crate::thread::state::ThreadId) -> bool {
    use crate::config::{canary, STACKS};

    let idx = id.as_usize();
    // SAFETY: reads only the fixed sentinel bytes at the low end of the
    // slot's stack region; never aliased with a live `&mut` to `STACKS`.
    // `read_volatile` (not a plain load) because the compiler cannot see
    // the asynchronous writer (the running thread's own stack usage) and
    // would otherwise be free to hoist or elide the read.
    unsafe {
        let region = core::ptr::addr_of!(STACKS[idx]) as *const u8;
        for offset in 0..canary::CANARY_WIDTH {
            if core::ptr::read_volatile(region.add(offset)) != canary::SENTINEL {
                return false;
            }
        }
    }
    true
}

#[cfg(all(feature = "stack-canary", test))]
mod tests {
    use super::*;
    use crate::config::{canary, STACKS};
    use crate::thread::state::ThreadId;

    #[test]
    fn canary_reports_intact_after_seeding() {
        unsafe {
            for offset in 0..canary::CANARY_WIDTH {
                STACKS[0][offset] = canary::SENTINEL;
            }
        }
        assert!(canary_intact(ThreadId(0)));
    }

    #[test]
    fn canary_reports_corrupted_after_overwrite() {
        unsafe {
            for offset in 0..canary::CANARY_WIDTH {
                STACKS[1][offset] = canary::SENTINEL;
            }
            STACKS[1][0] = 0x00;
        }
        assert!(!canary_intact(ThreadId(1)));
    }
}
