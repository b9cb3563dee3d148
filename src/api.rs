//! The public thread API (§4.4).
//!
//! Every function here is synchronous and runs on the calling thread. The
//! five that can transfer control away from the caller — `create`/
//! `disable` on the current slot (scheduler-without-save), `suspend` on
//! the current slot, and `sleep`/`sleep_long`/`yield_now` (cooperative
//! yield) — are the only suspension points in the core (§5).

use crate::bootstrap::{self, EntryFn};
use crate::kassert;
use crate::scheduler;
use crate::thread::{ThreadId, SLOTS};

/// Populates slot `id` with a fresh bootstrap frame and marks it runnable
/// per the caller's `suspended` flag. If `id` is the caller's own slot,
/// this never returns: control transfers via scheduler-without-save to
/// whatever the scheduler picks next, with the caller's own stack about
/// to be overwritten by the frame just written.
pub fn create(id: ThreadId, entry: EntryFn, suspended: bool, arg: *mut u8) {
    kassert!(id.is_valid(), "create: thread id out of range");
    kassert!(entry as usize != 0, "create: entry must not be null");

    let sp = unsafe { bootstrap::write_initial_frame(id, entry, arg) };
    unsafe {
        SLOTS[id.as_usize()].sp = sp;
        SLOTS[id.as_usize()].sleep_counter = 0;
    }
    scheduler::mark_created(id, suspended);
    log::debug!("thread {} created (suspended={})", id.0, suspended);

    if scheduler::is_current(id) {
        scheduler::abandon_current();
    }
}

/// Sets `disabled` for `id`. Self-targeting call never returns.
pub fn disable(id: ThreadId) {
    kassert!(id.is_valid(), "disable: thread id out of range");
    scheduler::disable_slot(id);
    log::debug!("thread {} disabled", id.0);
    if scheduler::is_current(id) {
        scheduler::abandon_current();
    }
}

/// Sets `suspended` for `id`. A self-targeting call yields (saving the
/// caller's context so `resume` can bring it back later).
pub fn suspend(id: ThreadId) {
    kassert!(id.is_valid(), "suspend: thread id out of range");
    scheduler::suspend_slot(id);
    log::debug!("thread {} suspended", id.0);
    if scheduler::is_current(id) {
        scheduler::yield_now();
    }
}

/// Clears `suspended` for `id`. A no-op on an already-disabled slot: it
/// stays disabled regardless of the suspended bit (§3, `disabled`
/// dominates).
pub fn resume(id: ThreadId) {
    kassert!(id.is_valid(), "resume: thread id out of range");
    scheduler::resume_slot(id);
    log::debug!("thread {} resumed", id.0);
}

/// Sleeps the calling thread for `ms` milliseconds, then yields. `sleep(0)`
/// never sets the `sleeping` bit (that would violate I3, `sleeping` ⇒
/// `sleep_counter > 0`) and just yields once.
pub fn sleep(ms: u16) {
    if ms == 0 {
        scheduler::yield_now();
        return;
    }
    let id = scheduler::current();
    scheduler::begin_sleep(id, ms);
    scheduler::yield_now();
}

/// As `sleep`, chunked into 16-bit pieces that sum exactly to `ms32`
/// (§8's chunking law). `sleep_long(0)` yields once, matching `sleep(0)`.
pub fn sleep_long(mut ms32: u32) {
    if ms32 == 0 {
        scheduler::yield_now();
        return;
    }
    while ms32 > 0 {
        let chunk = next_chunk(ms32);
        sleep(chunk);
        ms32 -= chunk as u32;
    }
}

/// The next 16-bit piece `sleep_long` will hand to `sleep`, split out as a
/// pure function so the chunking law is testable without driving the
/// scheduler (calling `sleep` on the host hangs when it is the only
/// runnable thread).
#[inline]
fn next_chunk(remaining: u32) -> u16 {
    core::cmp::min(remaining, u16::MAX as u32) as u16
}

/// Atomic snapshot of the 32-bit system counter.
pub fn millis() -> u32 {
    crate::tick::millis()
}

/// True iff `id`'s `disabled` bit is clear.
pub fn thread_enabled(id: ThreadId) -> bool {
    scheduler::thread_enabled(id)
}

/// True iff `id` is enabled and its `suspended` bit is set.
pub fn thread_suspended(id: ThreadId) -> bool {
    scheduler::thread_suspended(id)
}

/// True iff `id` is enabled and its `sleeping` bit is set.
pub fn thread_sleeping(id: ThreadId) -> bool {
    scheduler::thread_sleeping(id)
}

/// Cooperative yield: surrenders the CPU to the next runnable slot,
/// resuming here when the scheduler selects this thread again.
pub fn yield_now() {
    scheduler::yield_now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_THREADS;

    extern "C" fn demo_entry(_arg: *mut u8, _id: ThreadId) -> ! {
        loop {}
    }

    #[test]
    fn create_on_a_foreign_slot_leaves_it_runnable_per_the_flag() {
        scheduler::reset(ThreadId(0));
        create(ThreadId(1), demo_entry, false, core::ptr::null_mut());
        assert!(thread_enabled(ThreadId(1)));
        assert!(!thread_suspended(ThreadId(1)));
        assert_eq!(unsafe { SLOTS[1].sleep_counter }, 0);
    }

    #[test]
    fn create_suspended_sets_the_suspended_bit() {
        scheduler::reset(ThreadId(0));
        create(ThreadId(1), demo_entry, true, core::ptr::null_mut());
        assert!(thread_enabled(ThreadId(1)));
        assert!(thread_suspended(ThreadId(1)));
    }

    #[test]
    fn disable_and_suspend_are_idempotent() {
        scheduler::reset(ThreadId(0));
        create(ThreadId(1), demo_entry, false, core::ptr::null_mut());
        suspend(ThreadId(1));
        suspend(ThreadId(1));
        assert!(thread_suspended(ThreadId(1)));

        disable(ThreadId(1));
        disable(ThreadId(1));
        assert!(!thread_enabled(ThreadId(1)));
    }

    #[test]
    fn resume_on_a_non_suspended_slot_is_a_no_op() {
        scheduler::reset(ThreadId(0));
        create(ThreadId(1), demo_entry, false, core::ptr::null_mut());
        resume(ThreadId(1));
        assert!(!thread_suspended(ThreadId(1)));
    }

    #[test]
    fn resume_has_no_effect_on_a_disabled_slot() {
        scheduler::reset(ThreadId(0));
        disable(ThreadId(1));
        resume(ThreadId(1));
        assert!(!thread_enabled(ThreadId(1)));
    }

    #[test]
    fn thread_predicates_treat_disabled_as_dominant() {
        scheduler::reset(ThreadId(0));
        create(ThreadId(1), demo_entry, true, core::ptr::null_mut());
        disable(ThreadId(1));
        assert!(!thread_enabled(ThreadId(1)));
        assert!(!thread_suspended(ThreadId(1)));
        assert!(!thread_sleeping(ThreadId(1)));
    }

    #[test]
    fn max_threads_is_within_the_spec_ceiling() {
        assert!(MAX_THREADS >= 1 && MAX_THREADS <= 8);
    }

    /// §8's chunking law: the chunk sequence `sleep_long` would walk sums to
    /// exactly the requested duration, with every chunk but the last at the
    /// 16-bit ceiling.
    #[test]
    fn chunk_sequence_sums_to_the_requested_duration() {
        assert_eq!(chunk_sequence(70_000), vec![65535, 4465]);
        assert_eq!(chunk_sequence(u16::MAX as u32), vec![65535]);
        assert_eq!(chunk_sequence(1), vec![1]);
        assert_eq!(
            chunk_sequence(70_000).iter().map(|&c| c as u32).sum::<u32>(),
            70_000
        );
    }

    /// Drives `next_chunk` the same way `sleep_long`'s loop does, without
    /// touching the scheduler, and returns the sequence of chunks produced.
    fn chunk_sequence(mut remaining: u32) -> std::vec::Vec<u16> {
        let mut out = std::vec::Vec::new();
        while remaining > 0 {
            let chunk = next_chunk(remaining);
            out.push(chunk);
            remaining -= chunk as u32;
        }
        out
    }
}
