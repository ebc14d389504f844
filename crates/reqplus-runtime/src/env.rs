//! Defaults derived from the process environment

use std::ffi::OsString;
use std::path::PathBuf;

use crate::path::{self, PathPart};

/// Variables consulted for the staging root, in order.
pub const TMPDIR_VARS: [&str; 4] = ["REQPLUS_TMPDIR", "TMPDIR", "TEMP", "TMP"];

/// Variable holding extra search roots.
pub const LIB_PATH_VAR: &str = "REQPLUSLIB";

/// Subdirectory of `lib/` searched next to the executable.
pub const LIB_SUBDIR: &str = "reqplus";

/// Separator of entries in [`LIB_PATH_VAR`].
pub const PATH_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Staging root from the environment.
pub fn resolve_temp_root() -> PathBuf {
    resolve_temp_root_with(|var| std::env::var_os(var))
}

/// Staging root using `lookup` for variables. Empty values are skipped.
pub fn resolve_temp_root_with(lookup: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    TMPDIR_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_temp_root)
}

#[cfg(unix)]
fn default_temp_root() -> PathBuf {
    PathBuf::from("/tmp")
}

#[cfg(not(unix))]
fn default_temp_root() -> PathBuf {
    std::env::temp_dir()
}

/// Path of the running executable, if the platform can tell.
pub fn current_exe_path() -> Option<String> {
    std::env::current_exe()
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// Search roots from [`LIB_PATH_VAR`] and the executable's location.
pub fn initial_load_path() -> Vec<String> {
    let libs = std::env::var(LIB_PATH_VAR).ok();
    initial_load_path_with(libs.as_deref(), current_exe_path().as_deref())
}

/// Search roots from an explicit library list and executable path.
///
/// For `/opt/app/bin/app` the executable-relative roots are
/// `/opt/app/lib/reqplus`, `/opt/app/lib`, `/opt/app/bin/lib/reqplus`
/// and `/opt/app/bin/lib`, after the entries of `libs`.
pub fn initial_load_path_with(libs: Option<&str>, exe: Option<&str>) -> Vec<String> {
    let mut roots: Vec<String> = libs
        .map(|list| {
            list.split(PATH_LIST_SEPARATOR)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(exe) = exe else {
        return roots;
    };

    let bin_dir = path::split(exe).dir();
    if bin_dir.is_empty() {
        return roots;
    }

    let prefix = path::split(bin_dir).dir();
    if !prefix.is_empty() {
        roots.extend(lib_roots(prefix));
    }
    roots.extend(lib_roots(bin_dir));
    roots
}

fn lib_roots(base: &str) -> [String; 2] {
    let lib = path::join(vec![PathPart::from(base), "lib".into()]).into_owned();
    let sub = path::join([lib.as_str(), LIB_SUBDIR]).into_owned();
    [sub, lib]
}
