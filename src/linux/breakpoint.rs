//! Breakpoint manager - software breakpoint removal.
//!
//! Removal has to tolerate a debuggee that rewrote its own code while
//! the breakpoint was planted: the shadowed original bytes go back only
//! if the breakpoint encoding is still in place. The comparison reads
//! raw memory through a scoped guard so other planted breakpoints do
//! not shadow the view.

use crate::arch::{ArchInfo, BreakpointEncoding};
use crate::engine::memory::{MemoryIo, RawMemoryGuard};
use crate::osabi::{BreakpointError, BreakpointOps, BreakpointSite, RemoveStatus};

/// Remove a planted software breakpoint.
///
/// `resolver` supplies the canonical breakpoint encoding valid at the
/// site's address; with no encoding there is no software breakpoint
/// support and removal fails outright. Read failures propagate. Live
/// bytes differing from the encoding mean the debuggee modified the
/// code; writing the shadow back would corrupt it, so the site is
/// abandoned without touching memory.
pub fn remove_breakpoint(
    resolver: &dyn BreakpointEncoding,
    mem: &mut dyn MemoryIo,
    site: &BreakpointSite,
) -> Result<RemoveStatus, BreakpointError> {
    let address = site.address;
    let bp = resolver
        .breakpoint_for(address)
        .ok_or(BreakpointError::Unsupported { address })?;

    // Raw view for the whole read/compare/write sequence; the guard
    // restores the previous mode on every exit path.
    let mut guard = RawMemoryGuard::new(mem);

    let mut current = vec![0u8; bp.len()];
    guard.read(address, &mut current)?;

    if current == bp {
        guard.write(address, &site.shadow[..bp.len()])?;
        log::debug!(
            "breakpoint at {:#x} removed, restored bytes {}",
            address,
            hex::encode(&site.shadow[..bp.len()])
        );
        Ok(RemoveStatus::Restored)
    } else {
        log::debug!(
            "breakpoint at {:#x} overwritten by debuggee (found {}, expected {}), leaving memory alone",
            address,
            hex::encode(&current),
            hex::encode(bp)
        );
        Ok(RemoveStatus::SkippedModified)
    }
}

/// Breakpoint management capability for MicroBlaze/Linux; the
/// architecture itself resolves the encoding.
pub struct LinuxBreakpointOps;

pub static LINUX_BREAKPOINT_OPS: LinuxBreakpointOps = LinuxBreakpointOps;

impl BreakpointOps for LinuxBreakpointOps {
    fn remove(
        &self,
        arch: &ArchInfo,
        mem: &mut dyn MemoryIo,
        site: &BreakpointSite,
    ) -> Result<RemoveStatus, BreakpointError> {
        remove_breakpoint(arch, mem, site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::MICROBLAZE_BE;
    use crate::engine::memory::{MemoryError, MemoryImage};

    const BP_BE: [u8; 4] = [0xba, 0x0c, 0x00, 0x18];

    fn site(address: u64) -> BreakpointSite {
        BreakpointSite {
            address,
            shadow: vec![0x11, 0x22, 0x33, 0x44],
        }
    }

    fn image(live: &[u8]) -> MemoryImage {
        let mut mem = MemoryImage::new();
        mem.add_region(0x1000, live.to_vec());
        mem
    }

    #[test]
    fn test_intact_breakpoint_is_restored() {
        let mut mem = image(&BP_BE);
        let status =
            remove_breakpoint(&MICROBLAZE_BE, &mut mem, &site(0x1000)).unwrap();
        assert_eq!(status, RemoveStatus::Restored);

        let mut buf = [0u8; 4];
        mem.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_self_modified_code_is_left_alone() {
        // Debuggee rewrote the last byte since the plant.
        let live = [0xba, 0x0c, 0x00, 0xee];
        let mut mem = image(&live);
        let status =
            remove_breakpoint(&MICROBLAZE_BE, &mut mem, &site(0x1000)).unwrap();
        assert_eq!(status, RemoveStatus::SkippedModified);

        let mut buf = [0u8; 4];
        mem.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, live);
    }

    #[test]
    fn test_no_encoding_is_unsupported() {
        struct NoSupport;
        impl BreakpointEncoding for NoSupport {
            fn breakpoint_for(&self, _pc: u64) -> Option<&'static [u8]> {
                None
            }
        }

        let mut mem = image(&BP_BE);
        let err = remove_breakpoint(&NoSupport, &mut mem, &site(0x1000)).unwrap_err();
        assert!(matches!(
            err,
            BreakpointError::Unsupported { address: 0x1000 }
        ));

        // No memory writes happened.
        let mut buf = [0u8; 4];
        mem.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, BP_BE);
    }

    #[test]
    fn test_unaligned_address_is_unsupported() {
        let mut mem = image(&BP_BE);
        assert!(matches!(
            remove_breakpoint(&MICROBLAZE_BE, &mut mem, &site(0x1001)),
            Err(BreakpointError::Unsupported { address: 0x1001 })
        ));
    }

    #[test]
    fn test_read_failure_propagates_and_restores_mode() {
        let mut mem = MemoryImage::new(); // nothing mapped
        let err = remove_breakpoint(&MICROBLAZE_BE, &mut mem, &site(0x1000)).unwrap_err();
        assert!(matches!(
            err,
            BreakpointError::Memory(MemoryError::Unmapped { address: 0x1000, .. })
        ));

        // The raw-view guard must have reset the mode on the error path.
        assert!(!mem.set_show_raw(false));
    }

    #[test]
    fn test_removal_reads_raw_bytes_not_overlay() {
        // A second breakpoint's overlay covers the same word; removal
        // must compare against raw memory, not the shadowed view.
        let mut mem = image(&BP_BE);
        mem.plant_overlay(0x1000, vec![0x99, 0x99, 0x99, 0x99]);

        let status =
            remove_breakpoint(&MICROBLAZE_BE, &mut mem, &site(0x1000)).unwrap();
        assert_eq!(status, RemoveStatus::Restored);
    }
}
