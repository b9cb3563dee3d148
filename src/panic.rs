//! Panic handler (§10 ambient stack, §7 precondition violations).
//!
//! Mirrors the teacher's: mask interrupts first (a panicking ISR must not
//! be re-entered), log the location and message, then park. AVR has no
//! `hlt`; `arch::avr::cpu_idle` (the `sleep` instruction) is the
//! equivalent low-power parking primitive.

use core::panic::PanicInfo;

use crate::arch;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    arch::disable_interrupts();

    if let Some(location) = info.location() {
        log::error!(
            "PANIC at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        arch::cpu_idle();
    }
}
