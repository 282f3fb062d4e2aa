//! Register codec - raw Linux register blocks <-> register cache.
//!
//! The kernel hands out general-purpose registers as one fixed 200-byte
//! block (50 registers, 4 bytes each, uniform stride), identical for
//! live inspection and core-dump `.reg` sections. Translation is pure
//! layout work; the only validation is the exact-length check.

use crate::arch::{self, ArchInfo, NUM_REGS, REGISTER_SIZE};
use crate::engine::regcache::{RegcacheError, RegisterCache};
use crate::osabi::RegsetCodec;

/// Exact size of the kernel's general-purpose register block.
pub const SIZEOF_GREGSET: usize = NUM_REGS * REGISTER_SIZE;

fn check_gregset_len(block_len: usize) -> Result<(), RegcacheError> {
    if block_len != SIZEOF_GREGSET {
        return Err(RegcacheError::SizeMismatch {
            expected: SIZEOF_GREGSET,
            actual: block_len,
        });
    }
    Ok(())
}

/// Fill the register cache from a raw gregset block.
///
/// `regnum` of `None` translates every register; a specific number
/// restricts the work to that one register.
pub fn supply_gregset(
    cache: &mut RegisterCache,
    regnum: Option<usize>,
    block: &[u8],
) -> Result<(), RegcacheError> {
    check_gregset_len(block.len())?;
    match regnum {
        None => {
            for i in 0..NUM_REGS {
                let offset = i * REGISTER_SIZE;
                cache.raw_supply(i, &block[offset..offset + REGISTER_SIZE])?;
            }
        }
        Some(i) => {
            if i >= NUM_REGS {
                return Err(RegcacheError::UnknownRegister { regnum: i });
            }
            let offset = i * REGISTER_SIZE;
            cache.raw_supply(i, &block[offset..offset + REGISTER_SIZE])?;
        }
    }
    Ok(())
}

/// Write the register cache back into a raw gregset block.
///
/// With `regnum` of `None`, only registers the engine actually holds
/// are written; bytes for unpopulated registers are left untouched.
pub fn collect_gregset(
    cache: &RegisterCache,
    regnum: Option<usize>,
    block: &mut [u8],
) -> Result<(), RegcacheError> {
    check_gregset_len(block.len())?;
    match regnum {
        None => {
            for i in 0..NUM_REGS {
                if !cache.supplied(i) {
                    continue;
                }
                let offset = i * REGISTER_SIZE;
                cache.raw_collect(i, &mut block[offset..offset + REGISTER_SIZE])?;
            }
        }
        Some(i) => {
            if i >= NUM_REGS {
                return Err(RegcacheError::UnknownRegister { regnum: i });
            }
            let offset = i * REGISTER_SIZE;
            cache.raw_collect(i, &mut block[offset..offset + REGISTER_SIZE])?;
        }
    }
    Ok(())
}

/// Codec for the `.reg` general-purpose block.
pub struct GregsetCodec;

/// Codec for the `.reg2` floating-point block; the Linux ABI adds no
/// framing of its own, so it delegates to the architecture routine.
pub struct FpregsetCodec;

pub static GREGSET_CODEC: GregsetCodec = GregsetCodec;
pub static FPREGSET_CODEC: FpregsetCodec = FpregsetCodec;

impl RegsetCodec for GregsetCodec {
    fn name(&self) -> &'static str {
        ".reg"
    }

    fn block_size(&self) -> usize {
        SIZEOF_GREGSET
    }

    fn supply(
        &self,
        _arch: &ArchInfo,
        cache: &mut RegisterCache,
        regnum: Option<usize>,
        block: &[u8],
    ) -> Result<(), RegcacheError> {
        supply_gregset(cache, regnum, block)
    }

    fn collect(
        &self,
        _arch: &ArchInfo,
        cache: &RegisterCache,
        regnum: Option<usize>,
        block: &mut [u8],
    ) -> Result<(), RegcacheError> {
        collect_gregset(cache, regnum, block)
    }
}

impl RegsetCodec for FpregsetCodec {
    fn name(&self) -> &'static str {
        ".reg2"
    }

    fn block_size(&self) -> usize {
        arch::SIZEOF_FPREGSET
    }

    fn supply(
        &self,
        arch: &ArchInfo,
        cache: &mut RegisterCache,
        regnum: Option<usize>,
        block: &[u8],
    ) -> Result<(), RegcacheError> {
        arch::supply_fpregset(arch, cache, regnum, block)
    }

    fn collect(
        &self,
        arch: &ArchInfo,
        cache: &RegisterCache,
        regnum: Option<usize>,
        block: &mut [u8],
    ) -> Result<(), RegcacheError> {
        arch::collect_fpregset(arch, cache, regnum, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{FSR_REGNUM, MICROBLAZE_BE, PC_REGNUM};

    fn patterned_block() -> Vec<u8> {
        (0..SIZEOF_GREGSET).map(|i| i as u8).collect()
    }

    #[test]
    fn test_supply_all_then_collect_all_round_trips() {
        let block = patterned_block();
        let mut cache = RegisterCache::new(&MICROBLAZE_BE);
        supply_gregset(&mut cache, None, &block).unwrap();

        let mut out = vec![0u8; SIZEOF_GREGSET];
        collect_gregset(&cache, None, &mut out).unwrap();
        assert_eq!(out, block);
    }

    #[test]
    fn test_supply_single_register() {
        let block = patterned_block();
        let mut cache = RegisterCache::new(&MICROBLAZE_BE);
        supply_gregset(&mut cache, Some(PC_REGNUM), &block).unwrap();

        assert!(cache.supplied(PC_REGNUM));
        assert!(!cache.supplied(0));

        let offset = PC_REGNUM * REGISTER_SIZE;
        let mut raw = [0u8; REGISTER_SIZE];
        cache.raw_collect(PC_REGNUM, &mut raw).unwrap();
        assert_eq!(raw, block[offset..offset + REGISTER_SIZE]);
    }

    #[test]
    fn test_collect_skips_unpopulated() {
        let mut cache = RegisterCache::new(&MICROBLAZE_BE);
        cache.raw_supply(2, &[0xaa, 0xbb, 0xcc, 0xdd]).unwrap();

        let mut out = vec![0xff; SIZEOF_GREGSET];
        collect_gregset(&cache, None, &mut out).unwrap();

        assert_eq!(&out[8..12], &[0xaa, 0xbb, 0xcc, 0xdd]);
        // Everything the engine never populated stays untouched.
        assert!(out[..8].iter().all(|&b| b == 0xff));
        assert!(out[12..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_size_mismatch_fails_loudly() {
        let mut cache = RegisterCache::new(&MICROBLAZE_BE);
        let short = vec![0u8; SIZEOF_GREGSET - 1];
        assert!(matches!(
            supply_gregset(&mut cache, None, &short),
            Err(RegcacheError::SizeMismatch { expected, actual })
                if expected == SIZEOF_GREGSET && actual == SIZEOF_GREGSET - 1
        ));

        let mut long = vec![0u8; SIZEOF_GREGSET + 4];
        assert!(collect_gregset(&cache, None, &mut long).is_err());
    }

    #[test]
    fn test_fpregset_delegates_to_arch() {
        let mut cache = RegisterCache::new(&MICROBLAZE_BE);
        FPREGSET_CODEC
            .supply(&MICROBLAZE_BE, &mut cache, None, &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(cache.read_u32(FSR_REGNUM).unwrap(), 0x0102_0304);

        let mut out = [0u8; 4];
        FPREGSET_CODEC
            .collect(&MICROBLAZE_BE, &cache, None, &mut out)
            .unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_gregset_block_size_is_kernel_layout() {
        assert_eq!(GREGSET_CODEC.block_size(), 200);
    }
}
