//! Signal trampoline recognition for MicroBlaze/Linux.
//!
//! The kernel injects a two-instruction stub that issues
//! `rt_sigreturn` when a signal handler returns. The stub has no debug
//! information; the unwinder recognizes it by its exact instruction
//! words and reconstructs the interrupted frame from the `ucontext`
//! the kernel saved on the stub's stack.

use crate::arch::{BTR_REGNUM, REGISTER_SIZE, SP_REGNUM};
use crate::engine::tramp::{TrampFrame, TrampInsn, INSN_EXACT};
use crate::engine::unwind::{FrameId, NextFrame, TrampFrameCache, UnwindError};

/// Byte offset from the stub's entry-time stack pointer to the saved
/// register array inside the kernel's `ucontext`.
const UCONTEXT_REG_OFFSET: u64 = 24;

/// Populate a trampoline frame cache from a recognized signal stub.
///
/// `base` is the stub's stack pointer as recorded in the next frame.
/// Stub variants that adjust their stack as their first instruction
/// declare a non-zero `bias`; once the PC has moved past the entry
/// instruction the recorded stack pointer already reflects that
/// adjustment and must be un-adjusted before applying `offset`.
pub fn sigtramp_cache(
    next: &dyn NextFrame,
    cache: &mut TrampFrameCache,
    func: u64,
    offset: u64,
    bias: u64,
) -> Result<(), UnwindError> {
    let mut base = next.unwind_register(SP_REGNUM)?;
    if bias > 0 && next.pc_in_block() != func {
        base -= bias;
    }

    // Saved registers mirror the raw gregset layout: uniform stride
    // from the start of the context buffer.
    let gpregs = base + offset;
    for regnum in 0..BTR_REGNUM {
        cache.set_reg_addr(regnum, gpregs + (regnum * REGISTER_SIZE) as u64);
    }
    cache.set_id(FrameId {
        stack_base: base,
        code_addr: func,
    });

    log::trace!(
        "signal frame at stub {:#x}: context buffer {:#x}, stack base {:#x}",
        func,
        gpregs,
        base
    );
    Ok(())
}

fn sighandler_cache_init(
    frame: &TrampFrame,
    next: &dyn NextFrame,
    cache: &mut TrampFrameCache,
    func: u64,
) -> Result<(), UnwindError> {
    sigtramp_cache(next, cache, func, frame.context_offset, frame.stack_bias)
}

/// The rt_sigreturn stub the kernel plants for signal delivery:
/// load the syscall number, trap into the kernel.
pub static SIGHANDLER_TRAMP_FRAME: TrampFrame = TrampFrame {
    name: "microblaze-linux-sighandler",
    insn_size: 4,
    insns: &[
        // addik r12, r0, 119 (__NR_rt_sigreturn)
        TrampInsn { word: 0x3180_0077, mask: INSN_EXACT },
        // brki r14, 8
        TrampInsn { word: 0xb9cc_0008, mask: INSN_EXACT },
    ],
    context_offset: UCONTEXT_REG_OFFSET,
    stack_bias: 0,
    init: sighandler_cache_init,
};
