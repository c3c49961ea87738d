use core::arch::asm;

/// The registers a frame lookup needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub pc: u64,
    pub sp: u64,
}

/// Captures the pc and sp at the point of the call.
#[inline(always)]
pub fn capture() -> Frame {
    let pc: u64;
    let sp: u64;
    unsafe {
        asm!(
            "lea {pc}, [rip]",
            "mov {sp}, rsp",
            pc = out(reg) pc,
            sp = out(reg) sp,
            options(nomem, nostack, preserves_flags),
        );
    }
    Frame { pc, sp }
}

#[cfg(test)]
mod tests {
    #[test]
    fn captures_something_plausible() {
        let local = 0u8;
        let frame = super::capture();
        assert_ne!(frame.pc, 0);
        // the stack grows down, our locals live above the stack pointer
        assert!(frame.sp <= &local as *const u8 as u64);
    }
}
