//! Centralized analysis constants
//!
//! Naming conventions produced by the front-end lowering and the tunables of the
//! pointer analysis live here so that every component agrees on them.

/// Names the front-end gives to synthetic program entities
pub mod names {
    /// Per-file class holding top-level functions and file-scope code
    pub const DEFAULT_CLASS: &str = "%dflt";

    /// Per-file method holding file-scope statements
    pub const DEFAULT_METHOD: &str = "%dflt";

    /// Arrow functions are lowered to `%AM<n>$<outer>`
    pub const ARROW_FUNCTION_PREFIX: &str = "%AM";

    pub const CONSTRUCTOR: &str = "constructor";

    pub const THIS: &str = "this";

    pub const SUPER: &str = "super";

    pub const GLOBAL_THIS: &str = "globalThis";

    /// Project/file used for declarations that have no source in the Scene
    pub const BUILTIN_PROJECT: &str = "%builtin";
    pub const BUILTIN_FILE: &str = "%builtin.d.ts";
}

/// Context model
pub mod context {
    /// Largest accepted k for k-limited contexts
    pub const MAX_K_LIMIT: usize = 5;
}

/// Points-to sets
pub mod pts {
    /// Bits per word of the sparse bit vector backing
    pub const BITS_PER_WORD: u32 = 64;
}
