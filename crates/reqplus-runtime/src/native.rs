//! Staging and linking of native module images
//!
//! The dynamic linker only takes filenames, so an image that came out of
//! a VFS is written into a fresh private directory under the temp root,
//! linked from there, and deleted again. Each step is recorded in a
//! [`Ledger`]; whatever fails, nothing is left behind on disk.
//!
//! A module named `foo` (from `foo.so`, `foo.dll`, ...) exports up to three
//! symbols: `reqplus_foo_init`, `reqplus_foo_final` and
//! `reqplus_foo_bytecode`. At least one of init or bytecode is required.

use std::ffi::c_void;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqplus_sdk::{EntrySymbols, NativeHook};
use tracing::{debug, warn};

use crate::error::StageError;
use crate::ledger::Ledger;
use crate::library::Library;
use crate::path;

/// Prefix of every private staging directory.
pub const TEMPDIR_PREFIX: &str = "reqplus+";

const TEMPDIR_RANDOM_LEN: usize = 24;
const TEMPDIR_ATTEMPTS: u32 = 32;

/// Whether `ext` (with its dot) names a native module on this platform.
pub fn is_native_extension(ext: &str) -> bool {
    ext == ".so" || ext.strip_prefix('.') == Some(std::env::consts::DLL_EXTENSION)
}

/// Base name that entry symbols are derived from.
///
/// `/lib/my-ext.so` gives `my-ext`; a name without a native extension is
/// used whole.
pub fn feature_base(name: &str) -> &str {
    let parts = path::split(name);
    match parts.extname() {
        Some(ext) if is_native_extension(ext) => parts.stem(),
        _ => parts.basename(),
    }
}

/// Entry points exported by a linked module.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryPoints {
    /// Called once right after linking
    pub init: Option<NativeHook>,
    /// Called once at teardown
    pub final_: Option<NativeHook>,
    /// Start of an embedded bytecode image
    pub bytecode: Option<*const u8>,
}

impl EntryPoints {
    fn resolve(library: &Library, symbols: &EntrySymbols) -> Self {
        // SAFETY: exported hooks follow the NativeHook calling convention.
        let hook = |name: &str| {
            library
                .symbol(name)
                .map(|ptr| unsafe { std::mem::transmute::<*mut c_void, NativeHook>(ptr) })
        };
        EntryPoints {
            init: hook(&symbols.init),
            final_: hook(&symbols.final_),
            bytecode: library
                .symbol(&symbols.bytecode)
                .map(|ptr| ptr as *const u8),
        }
    }
}

/// A linked module that has not been registered yet.
#[derive(Debug)]
pub struct StagedModule {
    /// Owner of the linked code
    pub library: Library,
    /// What the module exports
    pub entry: EntryPoints,
    /// Staged paths that can only be removed once the library is unlinked,
    /// files before their directory. Empty where the linker lets the file go
    /// right after linking.
    pub staging: Vec<PathBuf>,
}

/// Write `image` under `tmp_root`, link it, and resolve its entry points.
///
/// On Unix the temp file and directory are already gone on success. On
/// Windows a mapped DLL cannot be deleted, so both are handed back in
/// [`StagedModule::staging`] for removal after unlinking.
pub fn stage_and_link(tmp_root: &Path, name: &str, image: &[u8]) -> Result<StagedModule, StageError> {
    stage_and_link_with(tmp_root, name, image, lock_exclusive)
}

fn stage_and_link_with(
    tmp_root: &Path,
    name: &str,
    image: &[u8],
    lock: impl FnOnce(&File) -> io::Result<()>,
) -> Result<StagedModule, StageError> {
    let mut ledger = Ledger::new();

    let dir = make_private_dir(tmp_root)?;
    let staged_dir = ledger.acquire("temp dir", dir.clone(), remove_dir);

    let file_path = dir.join(path::basename(name, None));
    let write_err = |source| StageError::Write {
        path: file_path.to_string_lossy().into_owned(),
        source,
    };
    let mut file = create_new(&file_path).map_err(write_err)?;
    let staged_file = ledger.acquire("temp file", file_path.clone(), remove_file);
    lock(&file)
        .and_then(|()| file.write_all(image))
        .and_then(|()| file.flush())
        .map_err(write_err)?;
    drop(file);

    let library = Library::open(&file_path)?;
    let library = ledger.acquire("link handle", library, drop);

    // The linker keeps its own mapping; the file is no longer needed.
    #[cfg(not(windows))]
    ledger.release(staged_file);

    let symbols = EntrySymbols::for_base(feature_base(name));
    let entry = ledger
        .get(&library)
        .map(|lib| EntryPoints::resolve(lib, &symbols))
        .unwrap_or_default();
    if entry.init.is_none() && entry.bytecode.is_none() {
        return Err(StageError::NoEntryPoint {
            init: symbols.init,
            bytecode: symbols.bytecode,
        });
    }

    let library = ledger
        .commit(library)
        .ok_or(StageError::Unstaged("link handle"))?;

    #[cfg(windows)]
    let staging = {
        let file = ledger
            .commit(staged_file)
            .ok_or(StageError::Unstaged("temp file"))?;
        let dir = ledger
            .commit(staged_dir)
            .ok_or(StageError::Unstaged("temp dir"))?;
        vec![file, dir]
    };
    #[cfg(not(windows))]
    let staging = {
        let _ = staged_dir;
        Vec::new()
    };

    debug!(
        name,
        path = library.path(),
        init = entry.init.is_some(),
        final_ = entry.final_.is_some(),
        bytecode = entry.bytecode.is_some(),
        "linked native module"
    );
    Ok(StagedModule {
        library,
        entry,
        staging,
    })
}

fn make_private_dir(root: &Path) -> Result<PathBuf, StageError> {
    let dir_err = |source| StageError::TempDir {
        root: root.to_string_lossy().into_owned(),
        source,
    };

    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    for _ in 0..TEMPDIR_ATTEMPTS {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMPDIR_RANDOM_LEN)
            .map(char::from)
            .collect();
        let candidate = root.join(format!("{TEMPDIR_PREFIX}{suffix}"));

        match builder.create(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(dir_err(e)),
        }
    }

    Err(dir_err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no unused directory name",
    )))
}

/// Create `path` for writing; fails if anything already exists there.
fn create_new(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o700).custom_flags(libc::O_NOFOLLOW);
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(0);
    }

    options.open(path)
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// `share_mode(0)` already keeps everyone else out.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

fn remove_file(path: PathBuf) {
    if let Err(error) = fs::remove_file(&path) {
        warn!(path = %path.display(), %error, "cannot remove staged image");
    }
}

fn remove_dir(dir: PathBuf) {
    if let Err(error) = fs::remove_dir(&dir) {
        warn!(path = %dir.display(), %error, "cannot remove staging directory");
    }
}
