//! ATmega328P-specific register save/restore, the cooperative context
//! switch, the bootstrap trampoline, and 1 ms timer programming.
//!
//! The switch shape mirrors the teacher's interrupt-based
//! push-call-switch-stack-pop-iretq handlers, with two AVR-specific
//! differences: there is no separate interrupt frame (a `yield` is a plain
//! `call`, not a trap, so the return address is already on the stack
//! before we push anything), and the epilogue ends in `ret` rather than
//! `iretq` since nothing here ever runs with interrupts hardware-disabled
//! by the CPU itself.

use core::arch::naked_asm;

use avr_device::atmega328p::TC0;

const SPL: u8 = 0x3d;
const SPH: u8 = 0x3e;
const SREG: u8 = 0x3f;

/// Whether the global interrupt flag (SREG bit 7) is currently set.
#[inline(always)]
pub fn interrupts_enabled() -> bool {
    let sreg: u8;
    unsafe {
        core::arch::asm!("in {0}, {1}", out(reg) sreg, const SREG, options(nomem, nostack, preserves_flags));
    }
    sreg & 0x80 != 0
}

#[inline(always)]
pub fn disable_interrupts() {
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack));
    }
}

#[inline(always)]
pub fn enable_interrupts() {
    unsafe {
        core::arch::asm!("sei", options(nomem, nostack));
    }
}

/// Parks the CPU in its lowest-power idle mode until the next interrupt.
/// Used by the scheduler when no slot is runnable (§4.5).
#[inline(always)]
pub fn cpu_idle() {
    unsafe {
        core::arch::asm!("sleep", options(nomem, nostack));
    }
}

/// Voluntary context switch. Called with interrupts enabled from thread
/// context (never from the tick ISR). Saves every callee-saved register
/// this thread is depending on, hands the current stack pointer to
/// `crate::scheduler::schedule_from_yield`, and installs whatever stack
/// pointer comes back — which may be this same thread's if it was the
/// only runnable one.
///
/// # Safety
/// Must only be reached through `scheduler::yield_now`, which has already
/// established that the running context is a normal thread stack (not the
/// tick ISR's).
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context() {
    naked_asm!(
        "push r2",  "push r3",  "push r4",  "push r5",
        "push r6",  "push r7",  "push r8",  "push r9",
        "push r10", "push r11", "push r12", "push r13",
        "push r14", "push r15", "push r16", "push r17",
        "push r28", "push r29",
        "in r0, 0x3f",
        "push r0",

        // Current SP, passed as this call's only argument.
        "in r24, 0x3d",
        "in r25, 0x3e",
        "call {schedule}",
        // r24:r25 now holds the stack pointer to resume.

        "cli",
        "out 0x3e, r25",
        "out 0x3d, r24",

        "pop r0",
        "out 0x3f, r0",
        "pop r29", "pop r28",
        "pop r17", "pop r16", "pop r15", "pop r14",
        "pop r13", "pop r12", "pop r11", "pop r10",
        "pop r9",  "pop r8",  "pop r7",  "pop r6",
        "pop r5",  "pop r4",  "pop r3",  "pop r2",
        "ret",
        schedule = sym crate::scheduler::schedule_from_yield,
    )
}

/// Abandons the current thread's context entirely and jumps straight to
/// whatever `crate::scheduler::schedule_without_save` picks. Used by
/// `disable`/`suspend`/`create` acting on the current thread id, where the
/// caller's own register state is provably dead (§4.3, "scheduler without
/// save"). No registers are pushed; the old stack pointer is simply
/// abandoned in place until `create()` reuses that slot's region.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context_without_save() -> ! {
    naked_asm!(
        "call {schedule}",
        "cli",
        "out 0x3e, r25",
        "out 0x3d, r24",
        "sei",
        "ret",
        schedule = sym crate::scheduler::schedule_without_save,
    )
}

/// Entered by `ret` at the end of a switch into a freshly created thread,
/// never by a `call` (there is no matching return). Recovers the thread id,
/// entry point, and argument `bootstrap::write_initial_frame` left just
/// above the saved stack pointer and jumps to the entry point. §4.2's
/// contract: the entry function is never expected to return, but if it
/// does, falls through to `trampoline_return`.
#[unsafe(naked)]
pub unsafe extern "C" fn bootstrap_trampoline() -> ! {
    naked_asm!(
        "pop r20",        // thread id
        "pop r24",        // entry pointer, low byte
        "pop r25",        // entry pointer, high byte
        "pop r22",        // argument pointer, low byte
        "pop r23",        // argument pointer, high byte
        "mov r30, r24",
        "mov r31, r25",
        "mov r24, r22",
        "mov r25, r23",
        "mov r22, r20",
        "ijmp",
    )
}

/// Programs Timer/Counter0 in CTC mode to raise a compare-match interrupt
/// every 1 ms, using a prescaler and `OCR0A` derived from
/// `config::CPU_FREQUENCY_HZ`. `config` asserts the frequency is one of
/// the two values this division covers.
pub fn timer_init(tc0: &TC0) {
    let cycles_per_ms = crate::config::CPU_FREQUENCY_HZ / 1000;
    // /64 prescaler keeps OCR0A under u8::MAX for both supported clocks
    // (16 MHz -> 250 cycles, 8 MHz -> 125 cycles).
    let ocr = (cycles_per_ms / 64) as u8;

    tc0.tccr0a.write(|w| w.wgm0().ctc());
    tc0.ocr0a.write(|w| w.bits(ocr.saturating_sub(1)));
    tc0.tccr0b.write(|w| w.cs0().prescale_64());
    tc0.timsk0.write(|w| w.ocie0a().set_bit());
}

#[cfg(test)]
mod tests {
    #[test]
    fn register_io_addresses_match_the_atmega328p_datasheet() {
        assert_eq!(super::SPL, 0x3d);
        assert_eq!(super::SPH, 0x3e);
        assert_eq!(super::SREG, 0x3f);
    }
}
