//! Engine seams - collaborator interfaces and reference pieces
//!
//! The generic debugging engine owns memory access, the register
//! cache, symbol tables and the unwinder proper. This module holds the
//! narrow interfaces the MicroBlaze/Linux backend plugs into, plus the
//! in-memory target image used for core dumps and tests.

pub mod memory;
pub mod regcache;
pub mod symbols;
pub mod tramp;
pub mod unwind;

// Re-export common types
pub use memory::{MemoryError, MemoryImage, MemoryIo, RawMemoryGuard};
pub use regcache::{RegcacheError, RegisterCache};
pub use unwind::{FrameId, NextFrame, TrampFrameCache};
