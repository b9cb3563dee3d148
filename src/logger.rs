//! Logging over UART (§10 ambient stack).
//!
//! Structured logging the way the teacher's `CluuLogger` does it: a
//! zero-sized `log::Log` implementor, installed once, printing
//! `[LEVEL] message` lines. The transport is USART0 instead of a serial
//! COM port, polled rather than interrupt-driven so it can safely be
//! called from the tick ISR's error paths without re-entering interrupt
//! state.
//!
//! Logging discipline for this core specifically: scheduler and
//! thread-state transitions (`create`/`disable`/`suspend`/`resume`) log at
//! `debug`, init and panics log at `info`/`error`. The tick ISR itself
//! never logs — at a 1 kHz rate it would dominate the UART and blow the
//! 1 ms budget.

use core::fmt::Write;

use log::{Level, LevelFilter, Metadata, Record};

struct Uart;

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        #[cfg(target_arch = "avr")]
        {
            let peripherals = unsafe { avr_device::atmega328p::Peripherals::steal() };
            let usart = peripherals.USART0;
            for byte in s.bytes() {
                while usart.ucsr0a.read().udre0().bit_is_clear() {}
                usart.udr0.write(|w| w.bits(byte));
            }
        }
        #[cfg(not(target_arch = "avr"))]
        {
            let _ = s;
        }
        Ok(())
    }
}

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(Uart, "[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Installs the logger. Called once from `init::run`, before anything
/// else that might log. Panics (via the `log` crate's own error path) if
/// a logger was already installed, which would indicate `init::run` ran
/// twice.
pub fn init() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Debug))
        .expect("logger already initialized");
}
