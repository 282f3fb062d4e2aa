//! Symbol lookup seam.
//!
//! Minimal view of the engine's symbol tables, enough for the stepping
//! hooks that skip shared-library trampolines and the dynamic linker's
//! resolver stub.

/// A function-level symbol covering some address.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    pub start: u64,
    /// Whether the symbol lives in a procedure linkage table section.
    pub in_plt: bool,
}

/// Lookup into the engine's (minimal) symbol tables.
pub trait SymbolLookup {
    /// The function symbol containing `pc`, if any.
    fn function_at(&self, pc: u64) -> Option<FunctionSymbol>;

    /// Address of the global (non-PLT) definition of `name`, if any.
    fn global_function(&self, name: &str) -> Option<u64>;
}
