//! Dynamic library handle
//!
//! Cross-platform linking of shared objects (.so, .dylib, .dll). The handle
//! unlinks on drop, so whoever owns the `Library` owns the linked code.

use std::ffi::{c_void, CString};
use std::path::Path;
use thiserror::Error;

/// Errors from the dynamic linker
#[derive(Debug, Error)]
pub enum LinkError {
    /// The linker refused the file
    #[error("cannot link {path}: {reason}")]
    Open {
        /// Path that was attempted
        path: String,
        /// Linker diagnostic
        reason: String,
    },

    /// Path or symbol contained an interior NUL
    #[error("invalid name for the dynamic linker: {0:?}")]
    InvalidName(String),
}

/// A linked shared object.
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Link the shared object at `path`.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Unix**: `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **Windows**: `LoadLibraryW` with the path encoded as UTF-16
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let handle = LibraryHandle::load(path)?;

        Ok(Library {
            handle,
            path: path.to_string_lossy().into_owned(),
        })
    }

    /// Address of an exported symbol, or `None` if it is not exported.
    pub fn symbol(&self, name: &str) -> Option<*mut c_void> {
        let c_name = CString::new(name).ok()?;
        let ptr = self.handle.symbol(&c_name);
        if ptr.is_null() {
            None
        } else {
            Some(ptr)
        }
    }

    /// Handle on the running program itself.
    #[cfg(test)]
    pub(crate) fn this_process() -> Result<Self, LinkError> {
        Ok(Library {
            handle: LibraryHandle::this_process()?,
            path: "<self>".to_string(),
        })
    }

    /// Path this library was linked from.
    ///
    /// The file itself may already be gone; the linked code stays mapped.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &Path) -> Result<Self, LinkError> {
        use std::ffi::CStr;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| LinkError::InvalidName(path.to_string_lossy().into_owned()))?;

        let handle = unsafe {
            // RTLD_NOW: fail here rather than at first call
            // RTLD_LOCAL: keep module symbols out of the global namespace
            libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL)
        };

        if handle.is_null() {
            let reason = unsafe {
                let err_ptr = libc::dlerror();
                if err_ptr.is_null() {
                    "unknown error".to_string()
                } else {
                    CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
                }
            };

            return Err(LinkError::Open {
                path: path.to_string_lossy().into_owned(),
                reason,
            });
        }

        Ok(UnixLibrary { handle })
    }

    #[cfg(test)]
    fn this_process() -> Result<Self, LinkError> {
        let handle = unsafe { libc::dlopen(std::ptr::null(), libc::RTLD_NOW) };
        if handle.is_null() {
            return Err(LinkError::Open {
                path: "<self>".to_string(),
                reason: "dlopen(NULL) failed".to_string(),
            });
        }
        Ok(UnixLibrary { handle })
    }

    fn symbol(&self, name: &CString) -> *mut c_void {
        unsafe {
            libc::dlerror();
            libc::dlsym(self.handle, name.as_ptr())
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &Path) -> Result<Self, LinkError> {
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        if wide[..wide.len() - 1].contains(&0) {
            return Err(LinkError::InvalidName(path.to_string_lossy().into_owned()));
        }

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let code = unsafe { GetLastError() };
            return Err(LinkError::Open {
                path: path.to_string_lossy().into_owned(),
                reason: format!("error code {}", code),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    #[cfg(test)]
    fn this_process() -> Result<Self, LinkError> {
        let exe = std::env::current_exe().map_err(|e| LinkError::Open {
            path: "<self>".to_string(),
            reason: e.to_string(),
        })?;
        Self::load(&exe)
    }

    fn symbol(&self, name: &CString) -> *mut c_void {
        unsafe { GetProcAddress(self.handle, name.as_ptr()) }
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

// Windows FFI declarations
#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut c_void;
    fn GetProcAddress(module: *mut c_void, procname: *const std::ffi::c_char) -> *mut c_void;
    fn FreeLibrary(module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}
