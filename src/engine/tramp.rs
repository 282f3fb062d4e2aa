//! Trampoline frame descriptors and the unwinder chain.
//!
//! OS signal stubs carry no debug information, so they are recognized
//! by exact instruction-word patterns. Descriptors live in an ordered
//! chain consulted when ordinary unwind rules fail; the most recently
//! prepended descriptor wins.

use crate::arch::{ArchInfo, Endianness};
use crate::engine::memory::MemoryIo;
use crate::engine::unwind::{NextFrame, TrampFrameCache, UnwindError};

/// One instruction word of a trampoline pattern, with a bitmask
/// selecting which bits must match.
#[derive(Debug, Clone, Copy)]
pub struct TrampInsn {
    pub word: u32,
    pub mask: u32,
}

/// Match all bits of the instruction word.
pub const INSN_EXACT: u32 = 0xffff_ffff;

/// Static description of one OS trampoline stub.
pub struct TrampFrame {
    /// Diagnostic name
    pub name: &'static str,
    /// Instruction width in bytes
    pub insn_size: usize,
    /// Masked instruction words, in stub order
    pub insns: &'static [TrampInsn],
    /// Byte offset from the stub's entry-time stack pointer to the
    /// saved register context
    pub context_offset: u64,
    /// Stack adjustment some stub variants perform as their first
    /// instruction; zero when the stub leaves its stack alone
    pub stack_bias: u64,
    /// Builds the frame cache once the pattern has matched; `func` is
    /// the detected stub entry address.
    pub init: fn(
        &TrampFrame,
        &dyn NextFrame,
        &mut TrampFrameCache,
        u64,
    ) -> Result<(), UnwindError>,
}

impl TrampFrame {
    /// Whether the full pattern matches target memory starting at `func`.
    fn matches_at(&self, mem: &mut dyn MemoryIo, endian: Endianness, func: u64) -> bool {
        for (i, insn) in self.insns.iter().enumerate() {
            let mut buf = [0u8; 4];
            if mem.read(func + (i * self.insn_size) as u64, &mut buf).is_err() {
                return false;
            }
            let word = endian.read_u32(&buf);
            if word & insn.mask != insn.word & insn.mask {
                return false;
            }
        }
        true
    }

    /// Locate the stub's entry address, given a PC anywhere inside the
    /// stub. Tries each instruction of the pattern as the one the PC
    /// is stopped at.
    pub fn start(&self, mem: &mut dyn MemoryIo, endian: Endianness, pc: u64) -> Option<u64> {
        for k in 0..self.insns.len() {
            let Some(func) = pc.checked_sub((k * self.insn_size) as u64) else {
                continue;
            };
            if self.matches_at(mem, endian, func) {
                return Some(func);
            }
        }
        None
    }
}

/// Ordered chain of trampoline descriptors.
///
/// Searched front to back; `prepend` inserts at the front so the most
/// recently registered descriptor shadows earlier ones.
#[derive(Default)]
pub struct TrampChain {
    frames: Vec<&'static TrampFrame>,
}

impl TrampChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `frame` ahead of every descriptor registered so far.
    pub fn prepend(&mut self, frame: &'static TrampFrame) {
        self.frames.insert(0, frame);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static TrampFrame> + '_ {
        self.frames.iter().copied()
    }

    /// Try every descriptor against the PC of the frame being unwound.
    ///
    /// `Ok(None)` means no descriptor matched and the caller should
    /// fall back to its next unwinding strategy.
    pub fn sniff(
        &self,
        arch: &ArchInfo,
        mem: &mut dyn MemoryIo,
        next: &dyn NextFrame,
    ) -> Result<Option<TrampFrameCache>, UnwindError> {
        let pc = next.pc_in_block();
        for frame in self.iter() {
            if let Some(func) = frame.start(mem, arch.endian, pc) {
                log::debug!(
                    "trampoline '{}' matched at pc {:#x}, stub entry {:#x}",
                    frame.name,
                    pc,
                    func
                );
                let mut cache = TrampFrameCache::new(arch.num_regs);
                (frame.init)(frame, next, &mut cache, func)?;
                return Ok(Some(cache));
            }
        }
        log::trace!("no trampoline pattern at pc {:#x}", pc);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::MICROBLAZE_BE;
    use crate::engine::memory::MemoryImage;
    use crate::engine::unwind::FrameId;

    fn image_with_words(base: u64, words: &[u32]) -> MemoryImage {
        let mut data = Vec::new();
        for w in words {
            data.extend_from_slice(&w.to_be_bytes());
        }
        let mut mem = MemoryImage::new();
        mem.add_region(base, data);
        mem
    }

    fn id_init(
        frame: &TrampFrame,
        _next: &dyn NextFrame,
        cache: &mut TrampFrameCache,
        func: u64,
    ) -> Result<(), UnwindError> {
        // Tag the cache with the descriptor's context offset so tests
        // can tell which descriptor ran.
        cache.set_id(FrameId {
            stack_base: frame.context_offset,
            code_addr: func,
        });
        Ok(())
    }

    static STUB_A: TrampFrame = TrampFrame {
        name: "stub-a",
        insn_size: 4,
        insns: &[
            TrampInsn { word: 0x1111_0000, mask: 0xffff_0000 },
            TrampInsn { word: 0x2222_2222, mask: INSN_EXACT },
        ],
        context_offset: 0xa,
        stack_bias: 0,
        init: id_init,
    };

    static STUB_B: TrampFrame = TrampFrame {
        name: "stub-b",
        insn_size: 4,
        insns: &[
            TrampInsn { word: 0x1111_2222, mask: INSN_EXACT },
            TrampInsn { word: 0x2222_2222, mask: INSN_EXACT },
        ],
        context_offset: 0xb,
        stack_bias: 0,
        init: id_init,
    };

    struct PcOnly(u64);

    impl NextFrame for PcOnly {
        fn unwind_register(&self, regnum: usize) -> Result<u64, UnwindError> {
            Err(UnwindError::RegisterUnavailable { regnum })
        }
        fn pc_in_block(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_start_at_entry_and_mid_stub() {
        let mut mem = image_with_words(0x4000, &[0x1111_9999, 0x2222_2222]);
        assert_eq!(STUB_A.start(&mut mem, Endianness::Big, 0x4000), Some(0x4000));
        // PC on the second instruction still resolves the entry.
        assert_eq!(STUB_A.start(&mut mem, Endianness::Big, 0x4004), Some(0x4000));
    }

    #[test]
    fn test_masked_mismatch() {
        let mut mem = image_with_words(0x4000, &[0x1111_9999, 0x2222_2223]);
        assert_eq!(STUB_A.start(&mut mem, Endianness::Big, 0x4000), None);
    }

    #[test]
    fn test_prepend_wins() {
        // Bytes match both descriptors; B was prepended after A, so B
        // must be selected.
        let mut mem = image_with_words(0x4000, &[0x1111_2222, 0x2222_2222]);
        let mut chain = TrampChain::new();
        chain.prepend(&STUB_A);
        chain.prepend(&STUB_B);

        let cache = chain
            .sniff(&MICROBLAZE_BE, &mut mem, &PcOnly(0x4000))
            .unwrap()
            .unwrap();
        assert_eq!(cache.id().unwrap().stack_base, 0xb);
    }

    #[test]
    fn test_no_match_is_no_opinion() {
        let mut mem = image_with_words(0x4000, &[0xdead_beef, 0xfeed_face]);
        let mut chain = TrampChain::new();
        chain.prepend(&STUB_A);

        let result = chain
            .sniff(&MICROBLAZE_BE, &mut mem, &PcOnly(0x4000))
            .unwrap();
        assert!(result.is_none());
    }
}
