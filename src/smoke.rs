//! On-target smoke test (§10 ambient stack test tooling).
//!
//! The host unit tests scattered through this crate cover everything pure:
//! bitset algebra, round-robin selection, tick accounting, chunked-sleep
//! arithmetic, bootstrap-frame layout. What they cannot cover is the
//! naked-asm context switch and the real 1 ms timer, since both need actual
//! AVR hardware. This module is the on-target counterpart, in the style of
//! the teacher's `tests::comprehensive::run_quick_smoke_test()`: a short,
//! linear sequence of checks run from a booted kernel, each logged as it
//! passes. It is not wired into `cargo test` — call `smoke::run()` from a
//! debug build's `main` after `init()` and `arch::enable_interrupts()`.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::api;
use crate::thread::ThreadId;

static ALTERNATIONS_SEEN: AtomicU8 = AtomicU8::new(0);

/// Worker for the alternation check (scenario 1): yields in a loop,
/// counting how many times it has run.
extern "C" fn alternating_worker(_arg: *mut u8, _id: ThreadId) -> ! {
    loop {
        ALTERNATIONS_SEEN.fetch_add(1, Ordering::SeqCst);
        api::yield_now();
    }
}

/// Worker for the suspend/resume handoff check (scenario 4): does nothing
/// but yield, so its mere presence in the rotation is what's being tested.
extern "C" fn idle_worker(_arg: *mut u8, _id: ThreadId) -> ! {
    loop {
        api::yield_now();
    }
}

/// The other worker in that same check: yields a few times (so the
/// rotation visibly has more than one live slot while thread 0 is
/// suspended), then resumes thread 0 and settles into the same idle loop.
extern "C" fn resumer_worker(_arg: *mut u8, _id: ThreadId) -> ! {
    for _ in 0..3 {
        api::yield_now();
    }
    api::resume(ThreadId::INITIAL);
    loop {
        api::yield_now();
    }
}

/// Runs every check in sequence and logs a final summary. Panics (via
/// `kassert!`-style `log::error!` then `panic!`) on the first failed
/// check, so a smoke test failure is as loud as any other panic.
///
/// # Safety
/// Must be called exactly once, from thread 0, after `init()` has run and
/// interrupts are enabled. Uses slots 1 and 2, so requires
/// `config::MAX_THREADS >= 3`.
pub fn run() {
    log::info!("smoke: starting on-target checks");

    check_millis_monotonic();
    check_alternation();
    check_sleep_accuracy();
    check_suspend_resume_handoff();

    log::info!("smoke: all checks passed");
}

/// I4: two `millis()` reads taken in sequence never go backwards.
fn check_millis_monotonic() {
    let a = api::millis();
    for _ in 0..1000 {
        core::hint::spin_loop();
    }
    let b = api::millis();
    if b < a {
        log::error!("smoke: millis() went backwards ({} then {})", a, b);
        panic!("millis() not monotonic");
    }
    log::info!("smoke: millis() monotonic ({} -> {})", a, b);
}

/// Scenario 1: a second thread alternating with thread 0 via `yield_now`
/// actually gets scheduled.
fn check_alternation() {
    ALTERNATIONS_SEEN.store(0, Ordering::SeqCst);
    api::create(ThreadId(1), alternating_worker, false, core::ptr::null_mut());

    for _ in 0..10 {
        api::yield_now();
    }

    let seen = ALTERNATIONS_SEEN.load(Ordering::SeqCst);
    if seen == 0 {
        log::error!("smoke: worker thread never ran after 10 yields");
        panic!("round-robin alternation failed");
    }
    log::info!("smoke: worker thread ran {} time(s) in 10 yields", seen);

    api::disable(ThreadId(1));
}

/// Scenario 2: `sleep(ms)` returns no earlier than `T + ms`.
fn check_sleep_accuracy() {
    const DURATION: u16 = 50;
    let start = api::millis();
    api::sleep(DURATION);
    let elapsed = api::millis() - start;
    if elapsed < DURATION as u32 {
        log::error!("smoke: sleep({}) returned after only {} ms", DURATION, elapsed);
        panic!("sleep returned early");
    }
    log::info!("smoke: sleep({}) took {} ms", DURATION, elapsed);
}

/// Scenario 4: suspending the current thread hands off control, and
/// resuming it from another thread brings it back into rotation.
fn check_suspend_resume_handoff() {
    api::create(ThreadId(1), idle_worker, false, core::ptr::null_mut());
    api::create(ThreadId(2), resumer_worker, false, core::ptr::null_mut());

    api::suspend(ThreadId::INITIAL);
    // Execution resumes here only once some other thread calls
    // `api::resume(ThreadId::INITIAL)`; see below.
    if api::thread_suspended(ThreadId::INITIAL) {
        log::error!("smoke: thread 0 observed itself still suspended after resuming");
        panic!("suspend/resume handoff failed");
    }
    log::info!("smoke: thread 0 rejoined the rotation after resume");

    api::disable(ThreadId(1));
    api::disable(ThreadId(2));
}
