//! Entry-symbol naming convention for native modules
//!
//! A native module for feature `my-ext` exports up to three symbols:
//!
//! ```text
//! reqplus_my_ext_init       void (*)(void *state)
//! reqplus_my_ext_final      void (*)(void *state)
//! reqplus_my_ext_bytecode   const uint8_t[]   (a complete bytecode image)
//! ```
//!
//! At least one of `init` and `bytecode` must be present.

/// Prefix shared by every entry symbol.
pub const COMMON_PREFIX: &str = "reqplus_";

/// Suffix of the initializer hook.
pub const INIT_SUFFIX: &str = "_init";

/// Suffix of the finalizer hook.
pub const FINAL_SUFFIX: &str = "_final";

/// Suffix of the embedded bytecode image.
pub const BYTECODE_SUFFIX: &str = "_bytecode";

/// Build the identifier fragment for a feature base name.
///
/// ASCII alphanumerics are kept; every other byte becomes `_`.
pub fn mangle(base: &str) -> String {
    base.bytes()
        .map(|b| if b.is_ascii_alphanumeric() { b as char } else { '_' })
        .collect()
}

/// The three entry symbol names of one native module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySymbols {
    /// Initializer hook, called once after linking
    pub init: String,
    /// Finalizer hook, called once at teardown
    pub final_: String,
    /// Embedded bytecode image
    pub bytecode: String,
}

impl EntrySymbols {
    /// Derive the symbol names for a feature base name (extension already
    /// removed).
    pub fn for_base(base: &str) -> Self {
        let stem = format!("{}{}", COMMON_PREFIX, mangle(base));
        EntrySymbols {
            init: format!("{}{}", stem, INIT_SUFFIX),
            final_: format!("{}{}", stem, FINAL_SUFFIX),
            bytecode: format!("{}{}", stem, BYTECODE_SUFFIX),
        }
    }
}
