//! Stack layout and the bootstrap protocol (§4.2).
//!
//! `create()` needs a freshly-created thread to be resumable by the exact
//! same "pop registers, `ret`" epilogue the context switch uses for a
//! thread that previously yielded. This module builds the synthetic stack
//! frame that makes that true: from the new thread's point of view, it
//! looks like it already pushed a full register frame and is about to
//! `ret` into `arch::avr::bootstrap_trampoline`, which then recovers the
//! entry point and argument and jumps there.
//!
//! Byte offsets below are derived from the avr-gcc calling convention
//! (callee-saved r2-r17, r28-r29 (Y), a 2-byte return address, no
//! frame pointer requirement for a freestanding `ret` target) the same way
//! §9 asks implementers to treat them: as generated constants tied to one
//! CPU's ABI, not arbitrary numbers.

use crate::config::{self, MAX_THREADS};
use crate::thread::ThreadId;

/// A thread entry point. Receives the opaque argument pointer `create()`
/// was given and its own id (so it can e.g. `api::disable(id)` on return,
/// the hardening fallback named in §4.2's Open Question).
pub type EntryFn = extern "C" fn(arg: *mut u8, id: ThreadId) -> !;

/// Number of callee-saved general-purpose registers pushed by the switch
/// epilogue: r2..=r17.
const CALLEE_SAVED_GP: usize = 16;
/// The frame/Y pointer pair, r28:r29, also callee-saved.
const CALLEE_SAVED_Y: usize = 2;
/// SREG, saved so a switch can't leak one thread's flags into another's.
const CALLEE_SAVED_SREG: usize = 1;
/// `call`/`ret` return address width on a <=128 KiB flash part (PC fits in
/// two bytes). Parts with >128 KiB flash need a 3-byte PC; not this chip.
const RETURN_ADDR_BYTES: usize = 2;
/// Bootstrap-only fields the trampoline reads off the stack: the thread id
/// (1 byte) and the entry point and argument pointers (2 bytes each).
const THREAD_ID_BYTES: usize = 1;
const ENTRY_PTR_BYTES: usize = 2;
const ARG_PTR_BYTES: usize = 2;

/// AVR `pop` pre-increments the stack pointer before reading (`SP <- SP+1;
/// Rd <- (SP)`), so the byte sitting *at* the saved stack pointer is never
/// read by any pop — the first pop of a switch consumes the byte one
/// address above it. This single byte of dead space makes that explicit
/// instead of silently losing the low byte of whatever real field starts
/// the frame.
const DEAD_BYTE_AT_SAVED_SP: usize = 1;

/// Total bytes the initial frame (and, by construction, every saved
/// context produced by a yield) occupies below a slot's stack base.
pub const INITIAL_STACK_USAGE: usize = DEAD_BYTE_AT_SAVED_SP
    + CALLEE_SAVED_GP
    + CALLEE_SAVED_Y
    + CALLEE_SAVED_SREG
    + RETURN_ADDR_BYTES
    + THREAD_ID_BYTES
    + ENTRY_PTR_BYTES
    + ARG_PTR_BYTES;

const _: () = assert!(INITIAL_STACK_USAGE < config::STACK_SIZE);

/// Byte offset of the trampoline return address within the frame, counting
/// up from the lowest address (the post-creation stack pointer). The 19
/// register pops that precede `ret` in the switch epilogue read the 19
/// bytes starting one past the saved stack pointer (see
/// `DEAD_BYTE_AT_SAVED_SP`), so the return address starts right after them,
/// not at offset `CALLEE_SAVED_GP + CALLEE_SAVED_Y + CALLEE_SAVED_SREG`.
const RET_ADDR_OFFSET: usize =
    DEAD_BYTE_AT_SAVED_SP + CALLEE_SAVED_GP + CALLEE_SAVED_Y + CALLEE_SAVED_SREG;
const THREAD_ID_OFFSET: usize = RET_ADDR_OFFSET + RETURN_ADDR_BYTES;
const ENTRY_PTR_OFFSET: usize = THREAD_ID_OFFSET + THREAD_ID_BYTES;
const ARG_PTR_OFFSET: usize = ENTRY_PTR_OFFSET + ENTRY_PTR_BYTES;

/// Writes the initial bootstrap frame for slot `id` and returns the saved
/// stack pointer `create()` should install.
///
/// Satisfies I5: the returned pointer lies in
/// `[base - INITIAL_STACK_USAGE, base)`, and the frame's SREG/Y/GP padding
/// is zeroed (its contents are irrelevant — they're popped and discarded
/// on the first switch into this thread, per §4.2).
///
/// # Safety
/// `id` must be a valid slot index and must not be the currently running
/// thread's own stack while it is live (creation of a *different* slot is
/// always safe to call from any thread; self-replacement goes through
/// `api::create`, which never returns to read this frame back).
pub unsafe fn write_initial_frame(id: ThreadId, entry: EntryFn, arg: *mut u8) -> *mut u8 {
    debug_assert!(id.is_valid());
    debug_assert!((id.as_usize()) < MAX_THREADS);

    let base = unsafe { config::stack_base(id.as_usize()) };
    let frame_low = unsafe { base.sub(INITIAL_STACK_USAGE) };

    unsafe {
        // Dead byte at the saved SP itself, plus the callee-saved GP
        // registers, Y pointer, and SREG: contents irrelevant, zeroed for a
        // deterministic first read.
        core::ptr::write_bytes(frame_low, 0, RET_ADDR_OFFSET);

        // `ret` loads PC(15:8) from (SP+1) and PC(7:0) from (SP+2): the high
        // byte sits at the lower address, not the low byte.
        let trampoline_addr = crate::arch::bootstrap_trampoline as usize as u16;
        frame_low.add(RET_ADDR_OFFSET).write((trampoline_addr >> 8) as u8);
        frame_low.add(RET_ADDR_OFFSET + 1).write(trampoline_addr as u8);

        frame_low.add(THREAD_ID_OFFSET).write(id.0);

        let entry_addr = entry as usize as u16;
        frame_low.add(ENTRY_PTR_OFFSET).write(entry_addr as u8);
        frame_low.add(ENTRY_PTR_OFFSET + 1).write((entry_addr >> 8) as u8);

        let arg_addr = arg as usize as u16;
        frame_low.add(ARG_PTR_OFFSET).write(arg_addr as u8);
        frame_low.add(ARG_PTR_OFFSET + 1).write((arg_addr >> 8) as u8);
    }

    frame_low
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy_entry(_arg: *mut u8, _id: ThreadId) -> ! {
        loop {}
    }

    #[test]
    fn frame_fits_between_base_minus_usage_and_base() {
        unsafe {
            let base = config::stack_base(1) as usize;
            let sp = write_initial_frame(ThreadId(1), dummy_entry, core::ptr::null_mut()) as usize;
            assert!(sp >= base - INITIAL_STACK_USAGE);
            assert!(sp < base);
            assert_eq!(sp, base - INITIAL_STACK_USAGE);
        }
    }

    #[test]
    fn trampoline_return_address_is_big_endian_for_ret() {
        unsafe {
            let sp = write_initial_frame(ThreadId(0), dummy_entry, core::ptr::null_mut());
            // `ret` reads PC(15:8) from (SP+1) and PC(7:0) from (SP+2) of the
            // stack pointer it resumes with, i.e. the high byte at the lower
            // address of the two-byte field this module writes.
            let hi = sp.add(RET_ADDR_OFFSET).read() as u16;
            let lo = sp.add(RET_ADDR_OFFSET + 1).read() as u16;
            let recovered = (hi << 8) | lo;
            assert_eq!(recovered, crate::arch::bootstrap_trampoline as usize as u16);
        }
    }

    #[test]
    fn thread_id_byte_is_recoverable() {
        unsafe {
            let sp = write_initial_frame(ThreadId(2), dummy_entry, core::ptr::null_mut());
            let id_byte = sp.add(THREAD_ID_OFFSET).read();
            assert_eq!(id_byte, 2);
        }
    }

    #[test]
    fn entry_and_arg_pointers_round_trip() {
        unsafe {
            let arg = 0x1234usize as *mut u8;
            let sp = write_initial_frame(ThreadId(3), dummy_entry, arg);

            let entry_lo = sp.add(ENTRY_PTR_OFFSET).read() as u16;
            let entry_hi = sp.add(ENTRY_PTR_OFFSET + 1).read() as u16;
            let recovered_entry = entry_lo | (entry_hi << 8);
            assert_eq!(recovered_entry, dummy_entry as usize as u16);

            let arg_lo = sp.add(ARG_PTR_OFFSET).read() as u16;
            let arg_hi = sp.add(ARG_PTR_OFFSET + 1).read() as u16;
            let recovered_arg = arg_lo | (arg_hi << 8);
            assert_eq!(recovered_arg, arg as usize as u16);
        }
    }
}
