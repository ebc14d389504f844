//! Reqplus SDK - the seam between the loader and its host runtime
//!
//! The loader never interprets script code itself. Compiling source text,
//! reading bytecode, and running a callable unit are services of the
//! embedding runtime, which exposes them by implementing [`HostRuntime`].
//!
//! This crate also fixes the native-module ABI: the hook signature
//! ([`NativeHook`]) and the entry-symbol naming convention
//! ([`EntrySymbols`]) that native-module authors export against.
//!
//! # Example
//!
//! ```ignore
//! use reqplus_sdk::EntrySymbols;
//!
//! let symbols = EntrySymbols::for_base("my-ext");
//! assert_eq!(symbols.init, "reqplus_my_ext_init");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod host;
pub mod symbols;
pub mod vfs;

pub use error::{Exception, HostResult};
pub use host::{
    BinaryVersion, Capabilities, ContextLayout, HostRuntime, NativeHook, NativeHooks,
};
pub use symbols::{mangle, EntrySymbols, COMMON_PREFIX, FINAL_SUFFIX, INIT_SUFFIX, BYTECODE_SUFFIX};
pub use vfs::Vfs;
