//! Register cache - per-register raw storage.
//!
//! The engine-side store the register codecs fill from raw kernel
//! blocks and drain back into them. Each slot holds the raw bytes of
//! one register, in target byte order, or is unavailable.

use thiserror::Error;

use crate::arch::ArchInfo;

/// Register cache errors
#[derive(Error, Debug)]
pub enum RegcacheError {
    #[error("Register block size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Unknown register number {regnum}")]
    UnknownRegister { regnum: usize },

    #[error("Register {regnum} has no cached value")]
    Unavailable { regnum: usize },
}

/// Raw per-register storage for one thread of the target.
pub struct RegisterCache {
    arch: &'static ArchInfo,
    slots: Vec<Option<Vec<u8>>>,
}

impl RegisterCache {
    pub fn new(arch: &'static ArchInfo) -> Self {
        Self {
            arch,
            slots: vec![None; arch.num_regs],
        }
    }

    pub fn arch(&self) -> &'static ArchInfo {
        self.arch
    }

    /// Store the raw bytes of one register.
    pub fn raw_supply(&mut self, regnum: usize, bytes: &[u8]) -> Result<(), RegcacheError> {
        if regnum >= self.arch.num_regs {
            return Err(RegcacheError::UnknownRegister { regnum });
        }
        if bytes.len() != self.arch.register_size {
            return Err(RegcacheError::SizeMismatch {
                expected: self.arch.register_size,
                actual: bytes.len(),
            });
        }
        self.slots[regnum] = Some(bytes.to_vec());
        Ok(())
    }

    /// Copy the raw bytes of one register out of the cache.
    pub fn raw_collect(&self, regnum: usize, out: &mut [u8]) -> Result<(), RegcacheError> {
        if regnum >= self.arch.num_regs {
            return Err(RegcacheError::UnknownRegister { regnum });
        }
        if out.len() != self.arch.register_size {
            return Err(RegcacheError::SizeMismatch {
                expected: self.arch.register_size,
                actual: out.len(),
            });
        }
        let bytes = self.slots[regnum]
            .as_ref()
            .ok_or(RegcacheError::Unavailable { regnum })?;
        out.copy_from_slice(bytes);
        Ok(())
    }

    /// Whether a register currently holds a value.
    pub fn supplied(&self, regnum: usize) -> bool {
        self.slots.get(regnum).is_some_and(|s| s.is_some())
    }

    /// Read one register as an unsigned value in target byte order.
    pub fn read_u32(&self, regnum: usize) -> Result<u32, RegcacheError> {
        let mut bytes = [0u8; 4];
        self.raw_collect(regnum, &mut bytes)?;
        Ok(self.arch.endian.read_u32(&bytes))
    }

    /// Store one register from an unsigned value in target byte order.
    pub fn write_u32(&mut self, regnum: usize, value: u32) -> Result<(), RegcacheError> {
        self.raw_supply(regnum, &self.arch.endian.write_u32(value))
    }
}
