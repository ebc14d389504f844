//! Virtual filesystem capability
//!
//! A VFS yields bytes for a name. It may be a directory on disk, an
//! archive, or a blob embedded in the executable. The loader core only
//! uses [`Vfs::label`] for diagnostics; the search driver uses the rest.

use std::borrow::Cow;
use std::io;

/// A source of loadable files.
pub trait Vfs {
    /// Prefix used for diagnostics and for canonical feature paths.
    fn label(&self) -> Cow<'_, str>;

    /// Whether `path` names a regular file.
    fn is_file(&self, path: &str) -> bool;

    /// Size of the file in bytes, if it exists.
    fn size(&self, path: &str) -> Option<u64>;

    /// Read the whole file.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}
