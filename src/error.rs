//! Error handling policy (§7, §10 ambient stack).
//!
//! The core recognizes exactly one error kind it actively checks for:
//! precondition violations (out-of-range thread ids, a null entry point).
//! Per §7 these are a debug-assertion facility only — checked in debug
//! builds, undefined behavior if violated in release. `kassert!` is that
//! facility: a `debug_assert!` wrapper that logs through the same
//! `log::error!` path the panic handler uses, so a precondition violation
//! and a genuine panic look the same on the wire.
//!
//! "No runnable thread" and "stack overflow" are not errors in this
//! sense: the former is handled by the scheduler's idle loop
//! (`scheduler::select_next`), the latter by the optional, passive
//! `stack-canary` feature (`thread::slot::canary_intact`). Neither goes
//! through this macro.

/// Precondition check per §7. Compiles to nothing in release builds —
/// callers are required to uphold these contracts themselves there.
#[macro_export]
macro_rules! kassert {
    ($cond:expr, $msg:expr) => {
        #[cfg(debug_assertions)]
        {
            if !($cond) {
                log::error!("precondition violated: {}", $msg);
                panic!($msg);
            }
        }
    };
}
