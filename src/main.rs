//! Demo application binary: boots the core, creates a second thread, and
//! alternates between the two via cooperative `yield` (§8 scenario 1).
//! Narrowed from the teacher's step-numbered `kstart()` boot sequence to
//! this core's own steps, which now live in `cokernel::init`.
#![no_std]
#![no_main]

use cokernel::ThreadId;

#[avr_device::entry]
fn main() -> ! {
    let peripherals = avr_device::atmega328p::Peripherals::take().expect("peripherals already taken");
    cokernel::init(&peripherals);

    unsafe {
        avr_device::interrupt::enable();
    }

    #[cfg(debug_assertions)]
    cokernel::smoke::run();

    cokernel::create(ThreadId(1), worker, false, core::ptr::null_mut());

    loop {
        cokernel::yield_now();
    }
}

extern "C" fn worker(_arg: *mut u8, _id: ThreadId) -> ! {
    loop {
        cokernel::yield_now();
    }
}
