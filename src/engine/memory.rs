//! Memory - target memory access seam
//!
//! The backend never owns the debuggee; it reads and writes through the
//! engine's memory layer. That layer may virtualize planted breakpoints
//! (reads see the shadowed original bytes), so a scoped raw-view mode is
//! part of the contract.

use thiserror::Error;

/// Memory operation errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to read memory at {address:#x}: {reason}")]
    ReadFailed { address: u64, reason: String },

    #[error("Failed to write memory at {address:#x}: {reason}")]
    WriteFailed { address: u64, reason: String },

    #[error("Unmapped memory at {address:#x} ({size} bytes)")]
    Unmapped { address: u64, size: usize },

    #[error("No target attached")]
    NoTarget,
}

/// Memory read/write access to the target, live process or core image.
pub trait MemoryIo {
    /// Read `buffer.len()` bytes starting at `address`.
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryError>;

    /// Write `data` to `address`, bypassing any breakpoint overlay.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError>;

    /// Switch raw-view mode on or off; returns the previous setting.
    ///
    /// In raw-view mode reads see actual target bytes, including any
    /// planted breakpoint encodings, instead of the shadowed originals.
    fn set_show_raw(&mut self, raw: bool) -> bool;
}

/// Scoped raw-view access to target memory.
///
/// Construction turns raw-view mode on; dropping the guard restores the
/// previous mode on every exit path, early returns and errors included.
pub struct RawMemoryGuard<'a> {
    mem: &'a mut dyn MemoryIo,
    prev: bool,
}

impl<'a> RawMemoryGuard<'a> {
    pub fn new(mem: &'a mut dyn MemoryIo) -> Self {
        let prev = mem.set_show_raw(true);
        Self { mem, prev }
    }

    pub fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryError> {
        self.mem.read(address, buffer)
    }

    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        self.mem.write(address, data)
    }
}

impl Drop for RawMemoryGuard<'_> {
    fn drop(&mut self) {
        self.mem.set_show_raw(self.prev);
    }
}

struct Region {
    base: u64,
    data: Vec<u8>,
}

struct Overlay {
    address: u64,
    shadow: Vec<u8>,
}

/// In-memory target image.
///
/// Backs core-dump inspection and tests: a handful of mapped regions
/// plus an optional breakpoint overlay, mirroring how the engine's live
/// memory layer presents shadowed bytes over planted breakpoints.
#[derive(Default)]
pub struct MemoryImage {
    regions: Vec<Region>,
    overlays: Vec<Overlay>,
    show_raw: bool,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a region of target memory at `base`.
    pub fn add_region(&mut self, base: u64, data: Vec<u8>) {
        self.regions.push(Region { base, data });
    }

    /// Record a planted breakpoint whose shadowed original bytes should
    /// be presented on non-raw reads of `address`.
    pub fn plant_overlay(&mut self, address: u64, shadow: Vec<u8>) {
        self.overlays.push(Overlay { address, shadow });
    }

    fn region_for(&mut self, address: u64, size: usize) -> Result<&mut Region, MemoryError> {
        self.regions
            .iter_mut()
            .find(|r| address >= r.base && address + size as u64 <= r.base + r.data.len() as u64)
            .ok_or(MemoryError::Unmapped { address, size })
    }
}

impl MemoryIo for MemoryImage {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryError> {
        let size = buffer.len();
        let region = self.region_for(address, size)?;
        let start = (address - region.base) as usize;
        buffer.copy_from_slice(&region.data[start..start + size]);

        if !self.show_raw {
            // Present the shadowed originals over any planted breakpoint
            // that overlaps the read.
            for ov in &self.overlays {
                for (i, &b) in ov.shadow.iter().enumerate() {
                    let a = ov.address + i as u64;
                    if a >= address && a < address + size as u64 {
                        buffer[(a - address) as usize] = b;
                    }
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        let size = data.len();
        let region = self.region_for(address, size)?;
        let start = (address - region.base) as usize;
        region.data[start..start + size].copy_from_slice(data);
        Ok(())
    }

    fn set_show_raw(&mut self, raw: bool) -> bool {
        std::mem::replace(&mut self.show_raw, raw)
    }
}
