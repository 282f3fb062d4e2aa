//! MicroBlaze/Linux ABI glue.
//!
//! Binds the register codec, breakpoint manager and signal-trampoline
//! unwinder into an `ArchHandle` when the engine selects the
//! (MicroBlaze, Linux) configuration.

pub mod breakpoint;
pub mod regset;
pub mod tramp;

use crate::arch::{self, Architecture, Endianness, RETADDR_REGNUM};
use crate::engine::symbols::SymbolLookup;
use crate::engine::unwind::NextFrame;
use crate::osabi::{
    ArchHandle, OsAbi, OsAbiRegistry, RegsetCodec, RegsetDescriptor, ILP32_LINK_MAP_OFFSETS,
};

/// Core-file format tag for big-endian targets.
pub const CORE_FORMAT_BE: &str = "elf32-microblaze";

/// Core-file format tag for little-endian targets.
pub const CORE_FORMAT_LE: &str = "elf32-microblazeel";

/// Dispatch a raw core-file register section to its codec. Sections
/// with an unexpected size are declined rather than misparsed.
fn core_section_codec(section: &str, size: usize) -> Option<&'static dyn RegsetCodec> {
    let codec: &'static dyn RegsetCodec = match section {
        ".reg" => &regset::GREGSET_CODEC,
        ".reg2" => &regset::FPREGSET_CODEC,
        _ => return None,
    };
    if size != codec.block_size() {
        log::debug!(
            "core section {} has size {}, expected {}; ignoring",
            section,
            size,
            codec.block_size()
        );
        return None;
    }
    Some(codec)
}

/// Resolve a shared-library call trampoline to its real target: a PLT
/// symbol steps to the like-named definition outside the PLT.
fn skip_plt_trampoline(syms: &dyn SymbolLookup, pc: u64) -> Option<u64> {
    let sym = syms.function_at(pc)?;
    if !sym.in_plt {
        return None;
    }
    let target = syms.global_function(&sym.name)?;
    if target == sym.start {
        return None;
    }
    log::debug!("skipping PLT stub '{}' at {:#x} -> {:#x}", sym.name, pc, target);
    Some(target)
}

/// Resolve a stop inside the dynamic linker's lazy resolver: stepping
/// resumes at the caller's return address, held in r15.
fn skip_solib_resolver(syms: &dyn SymbolLookup, next: &dyn NextFrame, pc: u64) -> Option<u64> {
    let resolver = syms.global_function("_dl_runtime_resolve")?;
    if syms.function_at(pc)?.start != resolver {
        return None;
    }
    next.unwind_register(RETADDR_REGNUM).ok()
}

/// Defaults shared by Linux targets regardless of architecture: the
/// floating-point state travels in the `.reg2` convention.
fn install_linux_defaults(handle: &mut ArchHandle) {
    log::debug!("applying generic Linux ABI defaults for {}", handle.arch().name);
    handle.set_fpregset(RegsetDescriptor {
        codec: &regset::FPREGSET_CODEC,
        size: arch::SIZEOF_FPREGSET,
    });
}

/// Configure an `ArchHandle` for MicroBlaze/Linux.
pub fn init_abi(handle: &mut ArchHandle) {
    let arch = handle.arch();

    handle.set_gregset(RegsetDescriptor {
        codec: &regset::GREGSET_CODEC,
        size: regset::SIZEOF_GREGSET,
    });

    install_linux_defaults(handle);

    handle.set_breakpoint_ops(&breakpoint::LINUX_BREAKPOINT_OPS);

    // Shared library handling.
    handle.set_link_map_offsets(&ILP32_LINK_MAP_OFFSETS);

    // Trampolines.
    handle.tramp_chain_mut().prepend(&tramp::SIGHANDLER_TRAMP_FRAME);

    // Persisted core files declare the byte-order-specific format.
    handle.set_core_format(match arch.endian {
        Endianness::Big => CORE_FORMAT_BE,
        Endianness::Little => CORE_FORMAT_LE,
    });
    handle.set_core_section_codec(core_section_codec);

    // Stepping through shared-library plumbing.
    handle.set_skip_trampoline(skip_plt_trampoline);
    handle.set_skip_solib_resolver(skip_solib_resolver);

    // TLS addresses resolve through the shared-library link map.
    handle.set_tls_via_link_map(true);
}

/// Register the MicroBlaze/Linux initializer. Call once at startup,
/// before any architecture is selected.
pub fn register(registry: &mut OsAbiRegistry) {
    registry.register(Architecture::MicroBlaze, OsAbi::Linux, init_abi);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{MICROBLAZE_BE, MICROBLAZE_LE, SP_REGNUM};
    use crate::engine::symbols::FunctionSymbol;
    use crate::engine::unwind::UnwindError;

    fn linux_handle(arch: &'static crate::arch::ArchInfo) -> ArchHandle {
        let mut registry = OsAbiRegistry::new();
        register(&mut registry);
        let mut handle = ArchHandle::new(arch);
        registry.init_arch(&mut handle, OsAbi::Linux).unwrap();
        handle
    }

    #[test]
    fn test_core_format_follows_byte_order() {
        assert_eq!(
            linux_handle(&MICROBLAZE_BE).core_format(),
            Some(CORE_FORMAT_BE)
        );
        assert_eq!(
            linux_handle(&MICROBLAZE_LE).core_format(),
            Some(CORE_FORMAT_LE)
        );
    }

    #[test]
    fn test_init_installs_all_hooks() {
        let handle = linux_handle(&MICROBLAZE_BE);
        assert_eq!(handle.gregset().unwrap().size, 200);
        assert_eq!(handle.fpregset().unwrap().size, arch::SIZEOF_FPREGSET);
        assert!(!handle.tramp_chain().is_empty());
        assert!(handle.link_map_offsets().is_some());
        assert!(handle.tls_via_link_map());
    }

    #[test]
    fn test_link_map_offsets_are_ilp32() {
        let handle = linux_handle(&MICROBLAZE_BE);
        let offsets = handle.link_map_offsets().unwrap();
        assert_eq!(offsets.r_map_offset, 4);
        assert_eq!(offsets.l_next_offset, 12);
        assert_eq!(offsets.link_map_size, 20);
    }

    #[test]
    fn test_core_section_dispatch() {
        let handle = linux_handle(&MICROBLAZE_BE);

        let greg = handle.codec_for_core_section(".reg", 200).unwrap();
        assert_eq!(greg.name(), ".reg");

        let fpreg = handle
            .codec_for_core_section(".reg2", arch::SIZEOF_FPREGSET)
            .unwrap();
        assert_eq!(fpreg.name(), ".reg2");

        // Wrong size or unknown section: no codec.
        assert!(handle.codec_for_core_section(".reg", 199).is_none());
        assert!(handle.codec_for_core_section(".xstate", 512).is_none());
    }

    struct ToySymbols;

    impl SymbolLookup for ToySymbols {
        fn function_at(&self, pc: u64) -> Option<FunctionSymbol> {
            match pc {
                0x1_0000..=0x1_00ff => Some(FunctionSymbol {
                    name: "puts".into(),
                    start: 0x1_0000,
                    in_plt: true,
                }),
                0x5_0000..=0x5_0fff => Some(FunctionSymbol {
                    name: "_dl_runtime_resolve".into(),
                    start: 0x5_0000,
                    in_plt: false,
                }),
                _ => None,
            }
        }

        fn global_function(&self, name: &str) -> Option<u64> {
            match name {
                "puts" => Some(0x9_0000),
                "_dl_runtime_resolve" => Some(0x5_0000),
                _ => None,
            }
        }
    }

    #[test]
    fn test_skip_plt_trampoline() {
        let handle = linux_handle(&MICROBLAZE_BE);
        assert_eq!(handle.skip_trampoline(&ToySymbols, 0x1_0004), Some(0x9_0000));
        // Not a PLT symbol: no opinion.
        assert_eq!(handle.skip_trampoline(&ToySymbols, 0x5_0000), None);
        assert_eq!(handle.skip_trampoline(&ToySymbols, 0xdead), None);
    }

    struct ResolverFrame;

    impl NextFrame for ResolverFrame {
        fn unwind_register(&self, regnum: usize) -> Result<u64, UnwindError> {
            match regnum {
                RETADDR_REGNUM => Ok(0x7_1234),
                SP_REGNUM => Ok(0xbf00_0000),
                _ => Err(UnwindError::RegisterUnavailable { regnum }),
            }
        }
        fn pc_in_block(&self) -> u64 {
            0x5_0000
        }
    }

    #[test]
    fn test_skip_solib_resolver_returns_caller() {
        let handle = linux_handle(&MICROBLAZE_BE);
        assert_eq!(
            handle.skip_solib_resolver(&ToySymbols, &ResolverFrame, 0x5_0000),
            Some(0x7_1234)
        );
        // Anywhere else: no opinion.
        assert_eq!(
            handle.skip_solib_resolver(&ToySymbols, &ResolverFrame, 0x1_0000),
            None
        );
    }
}
