//! Global kernel state and the scheduler policy (§4.1, §4.3).
//!
//! This module owns the three bitsets, the current-thread id and mask, and
//! the per-slot runtime table. `pick_next` is pure and runs identically on
//! the host and on-target, which is what makes round-robin fairness (I6)
//! and the end-to-end alternation scenario testable without hardware.
//! `schedule_from_yield`/`schedule_without_save` are the two Rust-side
//! halves of `arch::avr`'s naked switch; they are `extern "C"` because the
//! naked asm calls them directly and reads the return value out of the
//! AVR return-value registers.

use crate::arch;
use crate::config::MAX_THREADS;
use crate::thread::{ThreadId, ThreadMask, ThreadSet, SLOTS};

struct KernelState {
    current: ThreadId,
    current_mask: ThreadMask,
    disabled: ThreadSet,
    suspended: ThreadSet,
    sleeping: ThreadSet,
}

/// The single scheduler instance. Every field is plain `Copy` data;
/// reached only through the accessors below, never directly, mirroring
/// the teacher's single `SCHEDULER` singleton narrowed from a
/// `Mutex<Option<Scheduler>>` to a bare static since there is exactly one
/// core and no preemption to race against.
static mut STATE: KernelState = KernelState {
    current: ThreadId::INITIAL,
    current_mask: crate::thread::state::MASK_TABLE[0],
    disabled: ThreadSet::EMPTY,
    suspended: ThreadSet::EMPTY,
    sleeping: ThreadSet::EMPTY,
};

/// The current thread id. Valid everywhere except mid-switch.
pub fn current() -> ThreadId {
    unsafe { STATE.current }
}

pub(crate) fn current_mask() -> ThreadMask {
    unsafe { STATE.current_mask }
}

pub(crate) fn is_current(id: ThreadId) -> bool {
    id == current()
}

pub(crate) fn disable_slot(id: ThreadId) {
    unsafe { STATE.disabled.insert(id.mask()) };
}

pub(crate) fn suspend_slot(id: ThreadId) {
    unsafe { STATE.suspended.insert(id.mask()) };
}

pub(crate) fn resume_slot(id: ThreadId) {
    unsafe { STATE.suspended.remove(id.mask()) };
}

pub(crate) fn thread_enabled(id: ThreadId) -> bool {
    unsafe { !STATE.disabled.contains(id.mask()) }
}

pub(crate) fn thread_suspended(id: ThreadId) -> bool {
    thread_enabled(id) && unsafe { STATE.suspended.contains(id.mask()) }
}

pub(crate) fn thread_sleeping(id: ThreadId) -> bool {
    thread_enabled(id) && unsafe { STATE.sleeping.contains(id.mask()) }
}

/// Clears `disabled`/`sleeping` for a freshly (re)created slot and sets
/// `suspended` to the caller's request, per §3's creation contract.
///
/// The `sleeping` clear runs under `arch::with_interrupts_disabled`, same as
/// `begin_sleep`: the tick ISR read-modify-writes that same byte (`tick::
/// on_tick`'s snapshot/decrement/writeback), and a tick landing between this
/// function's read and write could otherwise resurrect the bit this call
/// just cleared, violating I3. `disabled`/`suspended` need no such masking
/// per §4.1 — the ISR never touches them.
pub(crate) fn mark_created(id: ThreadId, suspended: bool) {
    unsafe {
        STATE.disabled.remove(id.mask());
        if suspended {
            STATE.suspended.insert(id.mask());
        } else {
            STATE.suspended.remove(id.mask());
        }
    }
    arch::with_interrupts_disabled(|| unsafe {
        STATE.sleeping.remove(id.mask());
    });
}

/// Marks slot `id` asleep for `ms` milliseconds. Must run with interrupts
/// masked: the 16-bit counter write and the `sleeping` bit set are two
/// separate stores the tick ISR could otherwise interleave with (§5).
pub(crate) fn begin_sleep(id: ThreadId, ms: u16) {
    arch::with_interrupts_disabled(|| unsafe {
        SLOTS[id.as_usize()].sleep_counter = ms;
        STATE.sleeping.insert(id.mask());
    });
}

/// Snapshot of the bitset the tick ISR mutates, and the mutator it uses to
/// write it back. Kept here (not duplicated in `tick`) since `sleeping` is
/// part of this module's `KernelState`.
pub(crate) fn sleeping_snapshot() -> ThreadSet {
    unsafe { STATE.sleeping }
}

pub(crate) fn set_sleeping(new: ThreadSet) {
    unsafe { STATE.sleeping = new };
}

fn blocked() -> ThreadSet {
    unsafe { STATE.disabled.union(STATE.suspended).union(STATE.sleeping) }
}

/// Round-robin selection (§4.3): starting at `(current + 1) mod N`, return
/// the first id whose bit is clear in `blocked`. Pure function of its
/// arguments so I6 and scenario 1/4 are unit-testable without a scheduler
/// instance.
pub(crate) fn pick_next(current: ThreadId, blocked: ThreadSet) -> Option<ThreadId> {
    for step in 1..=MAX_THREADS {
        let candidate = (current.as_usize() + step) % MAX_THREADS;
        let candidate = ThreadId(candidate as u8);
        if !blocked.contains(candidate.mask()) {
            return Some(candidate);
        }
    }
    None
}

/// Blocks until some slot is runnable, re-enabling interrupts while it
/// waits (§4.3: "the idle loop must re-enable interrupts ... because
/// progress requires the tick ISR") and returns that slot, having already
/// updated `current`/`current_mask`.
fn select_next() -> ThreadId {
    let mut idling = false;
    loop {
        if let Some(next) = pick_next(current(), blocked()) {
            unsafe {
                STATE.current = next;
                STATE.current_mask = next.mask();
            }
            return next;
        }
        if !idling {
            log::debug!("scheduler: no runnable thread, idling for next tick");
            idling = true;
        }
        arch::enable_interrupts();
        arch::cpu_idle();
    }
}

/// Called from `arch::avr::switch_context`'s naked asm with the
/// outgoing thread's just-saved stack pointer. Stores it, selects the
/// next runnable slot, and returns its saved stack pointer for the asm
/// epilogue to install.
///
/// # Safety
/// Must only be reached from `switch_context`'s assembly, with `old_sp`
/// pointing at the top of a complete, freshly pushed register frame for
/// the outgoing thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn schedule_from_yield(old_sp: *mut u8) -> *mut u8 {
    let outgoing = current();
    SLOTS[outgoing.as_usize()].sp = old_sp;
    let next = select_next();
    SLOTS[next.as_usize()].sp
}

/// Called from `arch::avr::switch_context_without_save`'s naked asm.
/// The outgoing thread's register state is provably dead (self-disable,
/// self-suspend, or self-replacing `create`), so unlike
/// `schedule_from_yield` this never touches the outgoing slot's saved
/// stack pointer.
///
/// # Safety
/// Must only be reached from `switch_context_without_save`'s assembly.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn schedule_without_save() -> *mut u8 {
    let next = select_next();
    SLOTS[next.as_usize()].sp
}

/// Cooperative yield: the public entry point wired to `arch::avr`'s
/// register-saving switch.
pub fn yield_now() {
    unsafe { arch::switch_context() };
}

/// Scheduler-without-save entry point: the public surface for
/// self-targeting `disable`/`suspend`/`create`. Never returns.
pub(crate) fn abandon_current() -> ! {
    unsafe { arch::switch_context_without_save() }
}

/// One-shot setup of the bitsets and current-thread fields (§4.6). Stack
/// pointers and sleep counters are seeded by `init::run`, not here.
pub(crate) fn reset(initial: ThreadId) {
    unsafe {
        STATE.current = initial;
        STATE.current_mask = initial.mask();
        STATE.disabled = ThreadSet::all(MAX_THREADS);
        STATE.disabled.remove(initial.mask());
        STATE.suspended = ThreadSet::EMPTY;
        STATE.sleeping = ThreadSet::EMPTY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_next_scans_round_robin_from_current_plus_one() {
        let blocked = ThreadSet::EMPTY;
        assert_eq!(pick_next(ThreadId(0), blocked), Some(ThreadId(1)));
        assert_eq!(pick_next(ThreadId(MAX_THREADS as u8 - 1), blocked), Some(ThreadId(0)));
    }

    #[test]
    fn pick_next_skips_blocked_slots() {
        let mut blocked = ThreadSet::EMPTY;
        blocked.insert(ThreadId(1).mask());
        blocked.insert(ThreadId(2).mask());
        assert_eq!(pick_next(ThreadId(0), blocked), Some(ThreadId(3)));
    }

    #[test]
    fn pick_next_returns_current_if_it_is_the_only_runnable_slot() {
        let mut blocked = ThreadSet::all(MAX_THREADS);
        blocked.remove(ThreadId(0).mask());
        assert_eq!(pick_next(ThreadId(0), blocked), Some(ThreadId(0)));
    }

    #[test]
    fn pick_next_returns_none_when_everything_is_blocked() {
        let blocked = ThreadSet::all(MAX_THREADS);
        assert_eq!(pick_next(ThreadId(0), blocked), None);
    }

    #[test]
    fn reset_disables_every_slot_except_the_initial_one() {
        reset(ThreadId(0));
        assert!(thread_enabled(ThreadId(0)));
        for i in 1..MAX_THREADS {
            assert!(!thread_enabled(ThreadId(i as u8)));
        }
    }
}
