//! Filesystem-backed VFS and canonical feature paths

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::PathBuf;

use reqplus_sdk::Vfs;

use crate::path::{self, PathPart};

/// A VFS rooted at a directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemVfs {
    basedir: PathBuf,
}

impl SystemVfs {
    /// VFS over `basedir`.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        SystemVfs {
            basedir: basedir.into(),
        }
    }

    /// Root directory of this VFS.
    pub fn basedir(&self) -> &std::path::Path {
        &self.basedir
    }

    fn resolve(&self, path: &str) -> PathBuf {
        PathBuf::from(path::join(vec![PathPart::from(&self.basedir), path.into()]).into_owned())
    }
}

impl Vfs for SystemVfs {
    fn label(&self) -> Cow<'_, str> {
        self.basedir.to_string_lossy()
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn size(&self, path: &str) -> Option<u64> {
        fs::metadata(self.resolve(path))
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }
}

/// Canonical path of `path` inside `vfs`, used as a feature signature.
pub fn signature(vfs: &dyn Vfs, path: &str) -> String {
    path::join(vec![PathPart::Str(vfs.label()), path.into()]).into_owned()
}
