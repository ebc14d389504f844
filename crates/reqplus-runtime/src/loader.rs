//! Per-runtime loader
//!
//! [`Loader`] owns one host runtime together with everything loading needs
//! to remember about it: settings, the chosen execution strategy and the
//! registry of linked native modules. Dropping it tears the modules down.

use reqplus_sdk::{HostResult, HostRuntime, Vfs};
use tracing::{debug, info, warn};

use crate::binary;
use crate::bridge::ExecutionBridge;
use crate::error::{LoadError, RequireError};
use crate::native::{self, StagedModule};
use crate::options::{clamp_loadsize, LoaderOptions};
use crate::path;
use crate::registry::{LoadedModule, ModuleRegistry};

/// Extension of script source files.
pub const SOURCE_EXTENSION: &str = ".rb";

/// Extension of precompiled bytecode files.
pub const BYTECODE_EXTENSION: &str = ".mrb";

/// How a file's bytes are turned into running code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Script source, compiled by the host
    Source,
    /// Precompiled bytecode image
    Bytecode,
    /// Shared object with entry symbols
    Native,
}

impl ContentKind {
    /// Kind for a file extension including its dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            SOURCE_EXTENSION => Some(ContentKind::Source),
            BYTECODE_EXTENSION => Some(ContentKind::Bytecode),
            _ if native::is_native_extension(ext) => Some(ContentKind::Native),
            _ => None,
        }
    }

    /// Kind for a file name, judged by its extension.
    pub fn from_path(name: &str) -> Option<Self> {
        path::extname(name).and_then(Self::from_extension)
    }
}

/// Loader bound to one host runtime instance.
pub struct Loader<R: HostRuntime> {
    runtime: R,
    options: LoaderOptions,
    bridge: ExecutionBridge,
    registry: ModuleRegistry,
}

impl<R: HostRuntime> Loader<R> {
    /// Loader with options from the environment.
    pub fn new(runtime: R) -> Self {
        Self::with_options(runtime, LoaderOptions::from_env())
    }

    /// Loader with explicit options.
    pub fn with_options(runtime: R, mut options: LoaderOptions) -> Self {
        options.loadsize_max = clamp_loadsize(options.loadsize_max);
        let bridge = ExecutionBridge::select(runtime.capabilities());
        debug!(?bridge, loadsize_max = options.loadsize_max, "loader ready");
        Loader {
            runtime,
            options,
            bridge,
            registry: ModuleRegistry::new(),
        }
    }

    /// The host runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The host runtime, mutably.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Options this loader was created with; `loadsize_max` tracks
    /// [`Loader::set_loadsize_max`].
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Strategy used to run loaded code.
    pub fn bridge(&self) -> ExecutionBridge {
        self.bridge
    }

    /// Linked native modules, newest first.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Largest file the search driver should load.
    pub fn loadsize_max(&self) -> usize {
        self.options.loadsize_max
    }

    /// Set the maximum load size; returns the value actually stored.
    pub fn set_loadsize_max(&mut self, bytes: usize) -> usize {
        self.options.loadsize_max = clamp_loadsize(bytes);
        self.options.loadsize_max
    }

    /// Run `proc` as top-level code of this runtime.
    pub fn run_at_top_level(&mut self, proc: R::Proc) -> HostResult<R::Value> {
        self.bridge.run_at_top_level(&mut self.runtime, proc)
    }

    /// Load `bytes` with the pipeline for `kind`.
    pub fn load(
        &mut self,
        kind: ContentKind,
        vfs: &dyn Vfs,
        name: &str,
        signature: &str,
        bytes: &[u8],
    ) -> Result<(), RequireError> {
        match kind {
            ContentKind::Source => self.load_source(vfs, name, signature, bytes),
            ContentKind::Bytecode => self.load_bytecode(vfs, name, signature, bytes),
            ContentKind::Native => self.load_native(vfs, name, signature, bytes),
        }
    }

    /// Compile script source and run it at the top level.
    ///
    /// `signature` becomes the filename in backtraces. Syntax errors and
    /// exceptions raised by the script come back as [`RequireError::Script`].
    pub fn load_source(
        &mut self,
        vfs: &dyn Vfs,
        name: &str,
        signature: &str,
        source: &[u8],
    ) -> Result<(), RequireError> {
        debug!(vfs = %vfs.label(), name, signature, len = source.len(), "loading source");
        let proc = self.runtime.compile(source, signature)?;
        self.run_at_top_level(proc)?;
        Ok(())
    }

    /// Validate, decode and run a bytecode image.
    pub fn load_bytecode(
        &mut self,
        vfs: &dyn Vfs,
        name: &str,
        signature: &str,
        image: &[u8],
    ) -> Result<(), RequireError> {
        debug!(vfs = %vfs.label(), name, signature, len = image.len(), "loading bytecode");
        binary::validate(image, &self.runtime.binary_version(), name)?;
        self.run_bytecode(name, image)
    }

    /// Link a native module image, run its init hook and embedded bytecode.
    ///
    /// The module is registered before init runs, so it is finalized at
    /// teardown even when init raised.
    pub fn load_native(
        &mut self,
        vfs: &dyn Vfs,
        name: &str,
        signature: &str,
        image: &[u8],
    ) -> Result<(), RequireError> {
        debug!(vfs = %vfs.label(), name, signature, len = image.len(), "loading native module");
        let tmp_root = self.options.temp_root();
        let StagedModule {
            library,
            entry,
            staging,
        } = native::stage_and_link(&tmp_root, name, image)
            .map_err(|cause| {
                warn!(name, vfs = %vfs.label(), %cause, "native module failed to load");
                LoadError::FailedLoad {
                    name: name.to_string(),
                    vfs: vfs.label().into_owned(),
                    cause,
                }
            })?;

        self.registry
            .prepend(LoadedModule::new(name, library, entry.final_).with_staging(staging));

        if let Some(init) = entry.init {
            // SAFETY: `init` lives in the library just registered.
            unsafe { self.runtime.invoke_hook(init)? };
        }

        if let Some(ptr) = entry.bytecode {
            // SAFETY: the exported image stays mapped while the module is
            // registered, which outlasts this call.
            let image = unsafe { binary::trusted_image(ptr) };
            self.run_bytecode(name, image)?;
        }

        Ok(())
    }

    fn run_bytecode(&mut self, name: &str, image: &[u8]) -> Result<(), RequireError> {
        let unit = self
            .runtime
            .read_bytecode(image)
            .ok_or_else(|| LoadError::Corrupted {
                name: name.to_string(),
            })?;
        let proc = self.runtime.proc_from_bytecode(&unit);
        drop(unit);
        self.run_at_top_level(proc)?;
        Ok(())
    }

    /// Finalize and unlink all native modules, newest first.
    ///
    /// Returns how many were torn down; later calls return 0.
    pub fn shutdown(&mut self) -> usize {
        let count = self.registry.teardown_all(&mut self.runtime);
        if count > 0 {
            info!(count, "native modules torn down");
        }
        count
    }
}

impl<R: HostRuntime> Drop for Loader<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<R: HostRuntime> std::fmt::Debug for Loader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("options", &self.options)
            .field("bridge", &self.bridge)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
