//! blazedbg - MicroBlaze/Linux target backend
//!
//! Architecture/OS-specific layer of a multi-target symbolic debugger:
//! register-block translation, self-modification-tolerant breakpoint
//! removal, signal-trampoline unwinding and the ABI registry that wires
//! them into the engine for the (MicroBlaze, Linux) configuration.
//!
//! ```
//! use blazedbg::arch::MICROBLAZE_BE;
//! use blazedbg::osabi::{ArchHandle, OsAbi, OsAbiRegistry};
//!
//! let mut registry = OsAbiRegistry::new();
//! blazedbg::linux::register(&mut registry);
//!
//! let mut handle = ArchHandle::new(&MICROBLAZE_BE);
//! registry.init_arch(&mut handle, OsAbi::Linux).unwrap();
//! assert_eq!(handle.core_format(), Some("elf32-microblaze"));
//! ```

pub mod arch;
pub mod engine;
pub mod linux;
pub mod osabi;

// Re-export the types the engine touches most.
pub use engine::{FrameId, MemoryError, MemoryImage, MemoryIo, RegisterCache, TrampFrameCache};
pub use osabi::{ArchHandle, BreakpointSite, OsAbi, OsAbiRegistry, RemoveStatus};
