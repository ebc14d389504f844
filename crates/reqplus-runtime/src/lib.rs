//! Reqplus Runtime
//!
//! Native support layer of a script `require`/`load` facility: turns bytes
//! found by a search driver into running code inside a host runtime.
//!
//! - [`path`] - string path algebra (split, join, basename, ...)
//! - [`ledger`] - ordered cleanup of multi-step acquisitions
//! - [`binary`] - bytecode header validation
//! - [`bridge`] - running procs as top-level code
//! - [`native`] - staging native images on disk and linking them
//! - [`registry`] - linked modules and their teardown
//! - [`Loader`] - the three load pipelines bound to one runtime
//!
//! # Example
//!
//! ```ignore
//! use reqplus_runtime::{vfs, ContentKind, Loader, SystemVfs};
//!
//! let mut loader = Loader::new(my_runtime);
//! let lib = SystemVfs::new("/usr/lib/app");
//! let bytes = lib.read("json.rb")?;
//! let sig = vfs::signature(&lib, "json.rb");
//! loader.load(ContentKind::Source, &lib, "json", &sig, &bytes)?;
//! ```

pub mod binary;
pub mod bridge;
pub mod env;
pub mod error;
pub mod frame;
pub mod ledger;
pub mod library;
pub mod loader;
pub mod native;
pub mod options;
pub mod path;
pub mod registry;
pub mod vfs;

pub use bridge::ExecutionBridge;
pub use error::{LoadError, RequireError, StageError};
pub use frame::split_frame;
pub use ledger::{Held, Ledger};
pub use library::{Library, LinkError};
pub use loader::{ContentKind, Loader};
pub use options::{ConfigError, LoaderOptions};
pub use registry::{LoadedModule, ModuleRegistry};
pub use vfs::SystemVfs;

pub use reqplus_sdk as sdk;
