//! OS ABI registry and per-architecture capability table.
//!
//! The engine selects an (architecture, OS ABI) pair; the registry runs
//! the matching initializer, which installs register codecs, the
//! breakpoint manager, trampoline descriptors and the stepping hooks
//! into an `ArchHandle`. The engine then calls through the handle
//! without knowing which backend filled it in.

use thiserror::Error;

use crate::arch::{ArchInfo, Architecture};
use crate::engine::memory::{MemoryError, MemoryIo};
use crate::engine::regcache::{RegcacheError, RegisterCache};
use crate::engine::symbols::SymbolLookup;
use crate::engine::tramp::TrampChain;
use crate::engine::unwind::{NextFrame, TrampFrameCache, UnwindError};

/// OS ABI variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsAbi {
    /// Bare-metal / unknown
    None,
    /// GNU/Linux
    Linux,
}

/// Registry errors
#[derive(Error, Debug)]
pub enum OsAbiError {
    #[error("No ABI handler registered for {arch:?}/{osabi:?}")]
    NoHandler { arch: Architecture, osabi: OsAbi },
}

/// Breakpoint errors
#[derive(Error, Debug)]
pub enum BreakpointError {
    #[error("Software breakpoints not supported at {address:#x}")]
    Unsupported { address: u64 },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// A planted software breakpoint: where it sits and the original bytes
/// it overwrote.
#[derive(Debug, Clone)]
pub struct BreakpointSite {
    pub address: u64,
    /// Shadowed original bytes, restored on removal
    pub shadow: Vec<u8>,
}

/// Outcome of a breakpoint removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
    /// Shadow contents written back over the breakpoint encoding
    Restored,
    /// Live bytes no longer carry the breakpoint encoding; the
    /// debuggee modified the code, so nothing was written
    SkippedModified,
}

/// Bidirectional translation between a raw fixed-layout register block
/// and the engine's register cache.
pub trait RegsetCodec {
    /// Diagnostic name (matches the core section it decodes).
    fn name(&self) -> &'static str;

    /// Exact raw block size in bytes.
    fn block_size(&self) -> usize;

    /// Fill the cache from `block`; `regnum` of `None` means all.
    fn supply(
        &self,
        arch: &ArchInfo,
        cache: &mut RegisterCache,
        regnum: Option<usize>,
        block: &[u8],
    ) -> Result<(), RegcacheError>;

    /// Write cached registers back into `block`; `regnum` of `None`
    /// means all populated registers.
    fn collect(
        &self,
        arch: &ArchInfo,
        cache: &RegisterCache,
        regnum: Option<usize>,
        block: &mut [u8],
    ) -> Result<(), RegcacheError>;
}

/// Software breakpoint management for one architecture/OS pair.
pub trait BreakpointOps {
    /// Remove a planted breakpoint, restoring the shadowed bytes only
    /// when the live encoding is still intact.
    fn remove(
        &self,
        arch: &ArchInfo,
        mem: &mut dyn MemoryIo,
        site: &BreakpointSite,
    ) -> Result<RemoveStatus, BreakpointError>;
}

/// Offsets into the dynamic linker's `r_debug` / `link_map` structures
/// for one pointer width.
#[derive(Debug, Clone, Copy)]
pub struct LinkMapOffsets {
    pub r_version_offset: u64,
    pub r_map_offset: u64,
    pub link_map_size: u64,
    pub l_addr_offset: u64,
    pub l_name_offset: u64,
    pub l_ld_offset: u64,
    pub l_next_offset: u64,
    pub l_prev_offset: u64,
}

/// SVR4 layout for 32-bit targets.
pub static ILP32_LINK_MAP_OFFSETS: LinkMapOffsets = LinkMapOffsets {
    r_version_offset: 0,
    r_map_offset: 4,
    link_map_size: 20,
    l_addr_offset: 0,
    l_name_offset: 4,
    l_ld_offset: 8,
    l_next_offset: 12,
    l_prev_offset: 16,
};

/// Resolves a raw core-file section to the codec that understands it.
pub type CoreSectionFn = fn(section: &str, size: usize) -> Option<&'static dyn RegsetCodec>;

/// Resolves a shared-library trampoline at `pc` to its real target.
pub type SkipTrampolineFn = fn(&dyn SymbolLookup, pc: u64) -> Option<u64>;

/// Resolves a stop inside the dynamic linker's resolver to the address
/// stepping should continue to.
pub type SkipSolibResolverFn =
    fn(&dyn SymbolLookup, &dyn NextFrame, pc: u64) -> Option<u64>;

/// A register-set descriptor: codec plus its fixed raw size.
#[derive(Clone, Copy)]
pub struct RegsetDescriptor {
    pub codec: &'static dyn RegsetCodec,
    pub size: usize,
}

/// Per-architecture capability table.
///
/// Created empty by the engine for a chosen `ArchInfo`; an ABI
/// initializer fills in the slots once. The engine keeps the handle
/// and dispatches through it for the lifetime of the configuration.
pub struct ArchHandle {
    arch: &'static ArchInfo,
    configured: Option<OsAbi>,
    gregset: Option<RegsetDescriptor>,
    fpregset: Option<RegsetDescriptor>,
    breakpoints: Option<&'static dyn BreakpointOps>,
    link_map_offsets: Option<&'static LinkMapOffsets>,
    tramp_chain: TrampChain,
    core_format: Option<&'static str>,
    core_section_codec: Option<CoreSectionFn>,
    skip_trampoline: Option<SkipTrampolineFn>,
    skip_solib_resolver: Option<SkipSolibResolverFn>,
    tls_via_link_map: bool,
}

impl ArchHandle {
    pub fn new(arch: &'static ArchInfo) -> Self {
        Self {
            arch,
            configured: None,
            gregset: None,
            fpregset: None,
            breakpoints: None,
            link_map_offsets: None,
            tramp_chain: TrampChain::new(),
            core_format: None,
            core_section_codec: None,
            skip_trampoline: None,
            skip_solib_resolver: None,
            tls_via_link_map: false,
        }
    }

    pub fn arch(&self) -> &'static ArchInfo {
        self.arch
    }

    pub fn configured_osabi(&self) -> Option<OsAbi> {
        self.configured
    }

    // Installer side, called from ABI initializers.

    pub fn set_gregset(&mut self, desc: RegsetDescriptor) {
        self.gregset = Some(desc);
    }

    pub fn set_fpregset(&mut self, desc: RegsetDescriptor) {
        self.fpregset = Some(desc);
    }

    pub fn set_breakpoint_ops(&mut self, ops: &'static dyn BreakpointOps) {
        self.breakpoints = Some(ops);
    }

    pub fn set_link_map_offsets(&mut self, offsets: &'static LinkMapOffsets) {
        self.link_map_offsets = Some(offsets);
    }

    pub fn set_core_format(&mut self, format: &'static str) {
        self.core_format = Some(format);
    }

    pub fn set_core_section_codec(&mut self, resolver: CoreSectionFn) {
        self.core_section_codec = Some(resolver);
    }

    pub fn set_skip_trampoline(&mut self, hook: SkipTrampolineFn) {
        self.skip_trampoline = Some(hook);
    }

    pub fn set_skip_solib_resolver(&mut self, hook: SkipSolibResolverFn) {
        self.skip_solib_resolver = Some(hook);
    }

    pub fn set_tls_via_link_map(&mut self, enabled: bool) {
        self.tls_via_link_map = enabled;
    }

    pub fn tramp_chain_mut(&mut self) -> &mut TrampChain {
        &mut self.tramp_chain
    }

    // Engine side, dispatched through the installed capabilities.

    pub fn gregset(&self) -> Option<RegsetDescriptor> {
        self.gregset
    }

    pub fn fpregset(&self) -> Option<RegsetDescriptor> {
        self.fpregset
    }

    pub fn link_map_offsets(&self) -> Option<&'static LinkMapOffsets> {
        self.link_map_offsets
    }

    pub fn core_format(&self) -> Option<&'static str> {
        self.core_format
    }

    pub fn tls_via_link_map(&self) -> bool {
        self.tls_via_link_map
    }

    pub fn tramp_chain(&self) -> &TrampChain {
        &self.tramp_chain
    }

    /// Remove a planted breakpoint through the installed manager.
    pub fn remove_breakpoint(
        &self,
        mem: &mut dyn MemoryIo,
        site: &BreakpointSite,
    ) -> Result<RemoveStatus, BreakpointError> {
        let ops = self.breakpoints.ok_or(BreakpointError::Unsupported {
            address: site.address,
        })?;
        ops.remove(self.arch, mem, site)
    }

    /// Consult the trampoline chain for the frame being unwound.
    pub fn sniff_trampoline(
        &self,
        mem: &mut dyn MemoryIo,
        next: &dyn NextFrame,
    ) -> Result<Option<TrampFrameCache>, UnwindError> {
        self.tramp_chain.sniff(self.arch, mem, next)
    }

    /// Codec for a raw core-file register section, if one is installed
    /// and recognizes the section.
    pub fn codec_for_core_section(
        &self,
        section: &str,
        size: usize,
    ) -> Option<&'static dyn RegsetCodec> {
        self.core_section_codec.and_then(|f| f(section, size))
    }

    /// Resolve a shared-library trampoline target during stepping.
    pub fn skip_trampoline(&self, syms: &dyn SymbolLookup, pc: u64) -> Option<u64> {
        self.skip_trampoline.and_then(|f| f(syms, pc))
    }

    /// Resolve a dynamic-linker resolver stop during stepping.
    pub fn skip_solib_resolver(
        &self,
        syms: &dyn SymbolLookup,
        next: &dyn NextFrame,
        pc: u64,
    ) -> Option<u64> {
        self.skip_solib_resolver.and_then(|f| f(syms, next, pc))
    }
}

/// ABI initializer: fills in an empty `ArchHandle`.
pub type InitAbiFn = fn(&mut ArchHandle);

struct AbiInitEntry {
    arch: Architecture,
    osabi: OsAbi,
    init: InitAbiFn,
}

/// Append-only table of ABI initializers.
///
/// Built once at startup, before any architecture is selected, then
/// only consulted. An explicit object rather than process-global state
/// so initialization order stays visible to the caller.
#[derive(Default)]
pub struct OsAbiRegistry {
    entries: Vec<AbiInitEntry>,
}

impl OsAbiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an initializer for an (architecture, OS ABI) pair.
    /// Entries are never removed.
    pub fn register(&mut self, arch: Architecture, osabi: OsAbi, init: InitAbiFn) {
        log::debug!("registering ABI handler for {:?}/{:?}", arch, osabi);
        self.entries.push(AbiInitEntry { arch, osabi, init });
    }

    fn lookup(&self, arch: Architecture, osabi: OsAbi) -> Option<InitAbiFn> {
        self.entries
            .iter()
            .find(|e| e.arch == arch && e.osabi == osabi)
            .map(|e| e.init)
    }

    /// Configure `handle` for `osabi`, running the registered
    /// initializer. Re-configuring an already-configured handle is a
    /// no-op; the initializer runs at most once per handle.
    pub fn init_arch(&self, handle: &mut ArchHandle, osabi: OsAbi) -> Result<(), OsAbiError> {
        let arch = handle.arch().arch;
        if let Some(current) = handle.configured_osabi() {
            log::debug!(
                "handle for {:?} already configured as {:?}, skipping",
                arch,
                current
            );
            return Ok(());
        }
        let init = self
            .lookup(arch, osabi)
            .ok_or(OsAbiError::NoHandler { arch, osabi })?;
        init(handle);
        handle.configured = Some(osabi);
        log::info!("configured {} for {:?}", handle.arch().name, osabi);
        Ok(())
    }
}
