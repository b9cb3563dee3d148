/*
 * Compile-Time Kernel Configuration
 *
 * This module collects every value that must be fixed at build time: the
 * number of thread slots, each slot's stack region, whether stack canaries
 * are written, and the CPU frequency the 1 ms tick derivation assumes.
 *
 * Why this is important:
 * - The core is statically sized (no allocator, no dynamic thread count),
 *   so every data structure that depends on these constants is generated
 *   from them rather than grown at runtime.
 * - A mismatched CPU_FREQUENCY_HZ silently produces a tick that isn't 1 ms;
 *   the const assertions below turn that into a compile error instead.
 */

/// Number of statically configured thread slots. Must be in [1, 8]; slot 0
/// is always the initial thread.
pub const MAX_THREADS: usize = 4;

/// Per-slot stack size, in bytes. 192 bytes leaves headroom for the 34-byte
/// register frame plus the bootstrap frame on a 2 KiB part hosting four
/// slots plus globals.
pub const STACK_SIZE: usize = 192;

const _: () = assert!(MAX_THREADS >= 1 && MAX_THREADS <= 8, "MAX_THREADS must be in [1, 8]");

/// CPU frequency the 1 ms tick timer program in `arch::avr::timer_init` is
/// derived for. Changing the crystal requires changing this constant; a
/// mismatch is rejected at compile time rather than silently drifting.
pub const CPU_FREQUENCY_HZ: u32 = 16_000_000;

const _: () = assert!(
    CPU_FREQUENCY_HZ == 16_000_000 || CPU_FREQUENCY_HZ == 8_000_000,
    "arch::avr::timer_init's prescaler/OCR1A math is only derived for 16 MHz or 8 MHz parts"
);

/// Statically reserved stack storage for every thread slot, one contiguous
/// block per slot. Slot `i` owns `STACKS[i]`, growing downward from its
/// last byte.
///
/// # Safety
/// Exactly two things may touch this array: `init()` (to seed it) and the
/// naked-asm context switch (to push/pop through the stack pointer it reads
/// out of `thread::slot::SLOTS[i].sp`). Application code never indexes it
/// directly.
#[unsafe(no_mangle)]
pub static mut STACKS: [[u8; STACK_SIZE]; MAX_THREADS] = [[0; STACK_SIZE]; MAX_THREADS];

/// Returns the one-past-the-end address of slot `id`'s stack region, i.e.
/// the value a fresh stack pointer starts at before anything is pushed.
///
/// # Safety
/// Reads the address of a `static mut`; callers must not alias this with a
/// live `&mut` to `STACKS`.
#[inline]
pub unsafe fn stack_base(id: usize) -> *mut u8 {
    unsafe { core::ptr::addr_of_mut!(STACKS[id]).add(1) as *mut u8 }
}

#[cfg(feature = "stack-canary")]
pub mod canary {
    use super::MAX_THREADS;

    /// Sentinel byte written to the lowest address of each slot's stack at
    /// init time. `thread::slot::canary_intact` compares against this.
    pub const SENTINEL: u8 = 0xC5;

    /// How many bytes at the low end of each stack carry the sentinel.
    pub const CANARY_WIDTH: usize = 4;

    const _: () = assert!(CANARY_WIDTH < super::STACK_SIZE);
    const _: () = assert!(MAX_THREADS <= 8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_base_points_past_region() {
        unsafe {
            let base0 = stack_base(0);
            let region0 = core::ptr::addr_of!(STACKS[0]) as *const u8;
            assert_eq!(base0 as usize, region0 as usize + STACK_SIZE);
        }
    }

    #[test]
    fn slots_are_disjoint() {
        unsafe {
            for i in 0..MAX_THREADS {
                for j in (i + 1)..MAX_THREADS {
                    let a = core::ptr::addr_of!(STACKS[i]) as usize;
                    let b = core::ptr::addr_of!(STACKS[j]) as usize;
                    assert!(a + STACK_SIZE <= b || b + STACK_SIZE <= a);
                }
            }
        }
    }
}
