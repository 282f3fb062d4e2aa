//! Architecture model for MicroBlaze.
//!
//! Register numbering, raw register sizes, breakpoint encoding and the
//! architecture-level fpregset layout. Everything OS-independent lives
//! here; the Linux-specific wiring is in `crate::linux`.

use crate::engine::regcache::{RegcacheError, RegisterCache};

/// Number of registers in the architecture's register file.
pub const NUM_REGS: usize = 50;

/// Raw width of every MicroBlaze register, in bytes.
pub const REGISTER_SIZE: usize = 4;

/// Stack pointer is r1 by convention.
pub const SP_REGNUM: usize = 1;

/// Link register (return address) is r15.
pub const RETADDR_REGNUM: usize = 15;

/// Program counter follows the 32 general-purpose registers.
pub const PC_REGNUM: usize = 32;

/// Machine status register.
pub const MSR_REGNUM: usize = 33;

/// Branch target register; first register *not* saved in a signal
/// context, so it doubles as the saved-register boundary.
pub const BTR_REGNUM: usize = 37;

/// Floating-point status register. MicroBlaze keeps FP values in the
/// general register file, so FSR is the whole arch-level FP state.
pub const FSR_REGNUM: usize = 36;

/// Arch-level floating-point block: just the FSR.
pub const SIZEOF_FPREGSET: usize = REGISTER_SIZE;

/// Canonical software breakpoint: `brki r16, 0x18`.
const BREAK_INSN: u32 = 0xba0c_0018;

static BREAK_INSN_BE: [u8; 4] = BREAK_INSN.to_be_bytes();
static BREAK_INSN_LE: [u8; 4] = BREAK_INSN.to_le_bytes();

static REG_NAMES: [&str; NUM_REGS] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
    "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23",
    "r24", "r25", "r26", "r27", "r28", "r29", "r30", "r31",
    "pc", "msr", "ear", "esr", "fsr", "btr",
    "pvr0", "pvr1", "pvr2", "pvr3", "pvr4", "pvr5",
    "pvr6", "pvr7", "pvr8", "pvr9", "pvr10", "pvr11",
];

/// Architecture identity, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    MicroBlaze,
}

/// Byte order of the target. MicroBlaze exists in both flavors and the
/// persisted core format differs between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    pub fn read_u32(self, bytes: &[u8; 4]) -> u32 {
        match self {
            Endianness::Big => u32::from_be_bytes(*bytes),
            Endianness::Little => u32::from_le_bytes(*bytes),
        }
    }

    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Big => value.to_be_bytes(),
            Endianness::Little => value.to_le_bytes(),
        }
    }
}

/// Static description of one architecture variant.
pub struct ArchInfo {
    /// Architecture identity
    pub arch: Architecture,
    /// Architecture name (e.g. "microblaze")
    pub name: &'static str,
    /// Number of registers in the register file
    pub num_regs: usize,
    /// Raw width of each register in bytes
    pub register_size: usize,
    /// Register holding the stack pointer
    pub sp_regnum: usize,
    /// Register holding the program counter
    pub pc_regnum: usize,
    /// Target byte order
    pub endian: Endianness,
    /// Register names (indexed 0..num_regs)
    pub reg_names: &'static [&'static str],
}

impl ArchInfo {
    /// Get the name of a register by number. Panics if out of range.
    pub fn reg_name(&self, regnum: usize) -> &'static str {
        self.reg_names[regnum]
    }

    /// Parse a register name to its number.
    pub fn parse_reg(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.reg_names.iter().position(|&n| n == lower)
    }
}

/// Big-endian MicroBlaze.
pub static MICROBLAZE_BE: ArchInfo = ArchInfo {
    arch: Architecture::MicroBlaze,
    name: "microblaze",
    num_regs: NUM_REGS,
    register_size: REGISTER_SIZE,
    sp_regnum: SP_REGNUM,
    pc_regnum: PC_REGNUM,
    endian: Endianness::Big,
    reg_names: &REG_NAMES,
};

/// Little-endian MicroBlaze.
pub static MICROBLAZE_LE: ArchInfo = ArchInfo {
    arch: Architecture::MicroBlaze,
    name: "microblazeel",
    num_regs: NUM_REGS,
    register_size: REGISTER_SIZE,
    sp_regnum: SP_REGNUM,
    pc_regnum: PC_REGNUM,
    endian: Endianness::Little,
    reg_names: &REG_NAMES,
};

/// Resolver for the software-breakpoint encoding valid at an address.
/// The encoding may be address-dependent, so a resolver is free to
/// decline an address entirely.
pub trait BreakpointEncoding {
    /// Canonical breakpoint bytes for `pc`, or `None` when software
    /// breakpoints are not supported at that address.
    fn breakpoint_for(&self, pc: u64) -> Option<&'static [u8]>;
}

impl BreakpointEncoding for ArchInfo {
    fn breakpoint_for(&self, pc: u64) -> Option<&'static [u8]> {
        // Instruction words are 4-byte aligned; anything else cannot
        // hold a breakpoint.
        if pc % REGISTER_SIZE as u64 != 0 {
            return None;
        }
        match self.endian {
            Endianness::Big => Some(&BREAK_INSN_BE),
            Endianness::Little => Some(&BREAK_INSN_LE),
        }
    }
}

/// Fill the register cache from an arch-level fpregset block.
///
/// `regnum` of `None` means every register in the block; MicroBlaze
/// only carries the FSR here.
pub fn supply_fpregset(
    arch: &ArchInfo,
    cache: &mut RegisterCache,
    regnum: Option<usize>,
    block: &[u8],
) -> Result<(), RegcacheError> {
    if block.len() != SIZEOF_FPREGSET {
        return Err(RegcacheError::SizeMismatch {
            expected: SIZEOF_FPREGSET,
            actual: block.len(),
        });
    }
    if regnum.is_none() || regnum == Some(FSR_REGNUM) {
        cache.raw_supply(FSR_REGNUM, &block[..arch.register_size])?;
    }
    Ok(())
}

/// Write the register cache back into an arch-level fpregset block.
pub fn collect_fpregset(
    arch: &ArchInfo,
    cache: &RegisterCache,
    regnum: Option<usize>,
    block: &mut [u8],
) -> Result<(), RegcacheError> {
    if block.len() != SIZEOF_FPREGSET {
        return Err(RegcacheError::SizeMismatch {
            expected: SIZEOF_FPREGSET,
            actual: block.len(),
        });
    }
    if regnum.is_none() || regnum == Some(FSR_REGNUM) {
        cache.raw_collect(FSR_REGNUM, &mut block[..arch.register_size])?;
    }
    Ok(())
}
