//! Unwinder seam - frame identity and the trampoline frame cache.
//!
//! The generic unwinder hands this layer a view of the next (more
//! recent) frame and consumes the cache built from it: a map from
//! register number to the address where that register's saved value
//! lives, plus a synthesized frame identity.

use thiserror::Error;

/// Unwinding errors
#[derive(Error, Debug)]
pub enum UnwindError {
    #[error("Register {regnum} cannot be unwound from the next frame")]
    RegisterUnavailable { regnum: usize },
}

/// Identity of a stack frame: stack base paired with the address of
/// the code owning the frame. Used to locate and compare frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId {
    pub stack_base: u64,
    pub code_addr: u64,
}

/// View of the next (more recent) frame, supplied by the generic
/// unwinder while it constructs the frame below it.
pub trait NextFrame {
    /// Value of `regnum` as seen by the frame being unwound.
    fn unwind_register(&self, regnum: usize) -> Result<u64, UnwindError>;

    /// Program counter of the frame being unwound, kept within its
    /// code block (one before the return address for call sites).
    fn pc_in_block(&self) -> u64;
}

/// Saved-register locations for one trampoline frame.
///
/// Built lazily when a trampoline descriptor matches; the unwinder
/// fetches register values by dereferencing the recorded addresses.
pub struct TrampFrameCache {
    reg_addrs: Vec<Option<u64>>,
    id: Option<FrameId>,
}

impl TrampFrameCache {
    pub fn new(num_regs: usize) -> Self {
        Self {
            reg_addrs: vec![None; num_regs],
            id: None,
        }
    }

    /// Record that `regnum`'s saved value lives at `addr`.
    pub fn set_reg_addr(&mut self, regnum: usize, addr: u64) {
        if let Some(slot) = self.reg_addrs.get_mut(regnum) {
            *slot = Some(addr);
        }
    }

    /// Address of `regnum`'s saved value, if recorded.
    pub fn reg_addr(&self, regnum: usize) -> Option<u64> {
        self.reg_addrs.get(regnum).copied().flatten()
    }

    pub fn set_id(&mut self, id: FrameId) {
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<FrameId> {
        self.id
    }
}
