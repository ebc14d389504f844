//! Registry of linked native modules
//!
//! Every native module that links successfully gets a record here, before
//! its init hook runs, so even a module whose init raised is finalized and
//! unlinked at shutdown. Teardown goes newest-loaded first: a module may
//! depend on anything loaded before it, never on anything after.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use reqplus_sdk::{NativeHook, NativeHooks};
use tracing::{debug, error, warn};

use crate::library::Library;

/// One linked native module.
pub struct LoadedModule {
    name: String,
    library: Library,
    finalizer: Option<NativeHook>,
    staging: Vec<PathBuf>,
}

impl LoadedModule {
    /// Record a linked module; `finalizer` must live inside `library`.
    pub fn new(name: impl Into<String>, library: Library, finalizer: Option<NativeHook>) -> Self {
        LoadedModule {
            name: name.into(),
            library,
            finalizer,
            staging: Vec::new(),
        }
    }

    /// Paths to delete once the library is unlinked, files before
    /// directories.
    pub fn with_staging(mut self, staging: Vec<PathBuf>) -> Self {
        self.staging = staging;
        self
    }

    /// Declared feature name the module was loaded as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the module was linked from.
    pub fn path(&self) -> &str {
        self.library.path()
    }

    /// Whether a finalizer will run at teardown.
    pub fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    fn finalize<H: NativeHooks + ?Sized>(self, host: &mut H) {
        let LoadedModule {
            name,
            library,
            finalizer,
            staging,
        } = self;

        if let Some(hook) = finalizer {
            // SAFETY: `hook` was resolved from `library`, which is still linked.
            match catch_unwind(AssertUnwindSafe(|| unsafe { host.invoke_hook(hook) })) {
                Ok(Ok(())) => {}
                Ok(Err(exception)) => {
                    warn!(module = %name, %exception, "finalizer raised; continuing teardown");
                }
                Err(_) => {
                    error!(module = %name, "finalizer panicked; continuing teardown");
                }
            }
        }

        debug!(module = %name, path = library.path(), "unlinking");
        drop(library);

        for path in staging {
            let removed = if path.is_dir() {
                fs::remove_dir(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(error) = removed {
                warn!(module = %name, path = %path.display(), %error, "cannot remove staged path");
            }
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("finalizer", &self.finalizer.is_some())
            .field("staging", &self.staging)
            .finish()
    }
}

/// Linked modules of one runtime instance, newest at the head.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    // The head of the list is the end of the vector.
    modules: Vec<LoadedModule>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `module` the new head.
    pub fn prepend(&mut self, module: LoadedModule) {
        debug!(module = module.name(), count = self.modules.len() + 1, "registered native module");
        self.modules.push(module);
    }

    /// Modules from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedModule> {
        self.modules.iter().rev()
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Finalize and unlink every module, newest first.
    ///
    /// A finalizer that raises or panics is logged and skipped over. Returns
    /// how many modules were torn down; a second call returns 0.
    pub fn teardown_all<H: NativeHooks + ?Sized>(&mut self, host: &mut H) -> usize {
        let mut count = 0;
        while let Some(module) = self.modules.pop() {
            module.finalize(host);
            count += 1;
        }
        count
    }
}
