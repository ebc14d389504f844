//! Path decomposition and joining
//!
//! Pure string functions, no I/O. The loader uses them to derive entry
//! symbol names and temp filenames, the search driver to build canonical
//! feature paths.
//!
//! ```text
//!   /usr/lib/ruby/foo.tar.gz
//!   ^^                        root        (root_end = 1)
//!   ^^^^^^^^^^^^^             dir         (dir_end)
//!                 ^^^^^^^^^^  basename    (base_start..name_end)
//!                        ^^^  extension   (ext_start..name_end)
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Which root and separator grammar to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `/` separates; the root is the run of leading separators.
    Posix,
    /// `/` and `\` separate; roots include `C:` drives and `//server/` prefixes.
    Windows,
}

impl Flavor {
    /// The flavor of the compilation target.
    pub const NATIVE: Flavor = if cfg!(windows) {
        Flavor::Windows
    } else {
        Flavor::Posix
    };

    /// Whether `b` separates components.
    #[inline]
    pub fn is_separator(self, b: u8) -> bool {
        match self {
            Flavor::Posix => b == b'/',
            Flavor::Windows => b == b'/' || b == b'\\',
        }
    }

    fn skip_separators(self, bytes: &[u8], mut i: usize) -> usize {
        while i < bytes.len() && self.is_separator(bytes[i]) {
            i += 1;
        }
        i
    }

    fn skip_root(self, bytes: &[u8]) -> usize {
        let mut i = 0;
        if self == Flavor::Windows && bytes.len() >= 2 {
            if self.is_separator(bytes[0]) && self.is_separator(bytes[1]) {
                // UNC: `//server/` is the root, share name starts a component
                i = self.skip_separators(bytes, 2);
                while i < bytes.len() {
                    let sep = self.is_separator(bytes[i]);
                    i += 1;
                    if sep {
                        break;
                    }
                }
                return i;
            } else if bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
                i = 2;
            }
        }
        self.skip_separators(bytes, i)
    }
}

/// Byte offsets of the parts of a path.
///
/// Always `root_end <= dir_end <= base_start <= ext_start <= name_end <= len`.
/// Every offset sits on an ASCII byte or at the end, so slicing is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathComponents<'a> {
    path: &'a str,
    /// End of the root component (drive, UNC prefix or leading separators)
    pub root_end: usize,
    /// End of the directory portion
    pub dir_end: usize,
    /// Start of the last component
    pub base_start: usize,
    /// Start of the extension, or `name_end` if there is none
    pub ext_start: usize,
    /// End of the last component, before any trailing separators
    pub name_end: usize,
}

impl<'a> PathComponents<'a> {
    /// The path these offsets index into.
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Root component, possibly empty.
    pub fn root(&self) -> &'a str {
        &self.path[..self.root_end]
    }

    /// Directory portion, possibly empty.
    pub fn dir(&self) -> &'a str {
        &self.path[..self.dir_end]
    }

    /// Last component including its extension.
    pub fn basename(&self) -> &'a str {
        &self.path[self.base_start..self.name_end]
    }

    /// Last component without its extension.
    pub fn stem(&self) -> &'a str {
        &self.path[self.base_start..self.ext_start]
    }

    /// Extension including the leading dot.
    pub fn extname(&self) -> Option<&'a str> {
        if self.ext_start == self.name_end {
            None
        } else {
            Some(&self.path[self.ext_start..self.name_end])
        }
    }
}

/// Split `path` using the target's flavor.
pub fn split(path: &str) -> PathComponents<'_> {
    split_with(path, Flavor::NATIVE)
}

/// Split `path` into root, directory, basename and extension.
///
/// A leading run of dots in a component never starts an extension, so
/// `.bashrc` has none, and neither does a name ending in a lone dot.
pub fn split_with(path: &str, flavor: Flavor) -> PathComponents<'_> {
    let bytes = path.as_bytes();
    let end = bytes.len();
    let root_end = flavor.skip_root(bytes);

    let mut parts = PathComponents {
        path,
        root_end,
        dir_end: root_end,
        base_start: root_end,
        ext_start: root_end,
        name_end: root_end,
    };

    let mut i = root_end;
    loop {
        i = flavor.skip_separators(bytes, i);
        if i >= end {
            break;
        }

        let start = i;
        while i < end && bytes[i] == b'.' {
            i += 1;
        }

        let mut dot = None;
        while i < end && !flavor.is_separator(bytes[i]) {
            if bytes[i] == b'.' {
                dot = Some(i);
            }
            i += 1;
        }

        parts.dir_end = parts.name_end;
        parts.base_start = start;
        parts.name_end = i;
        parts.ext_start = match dot {
            Some(d) if i - d >= 2 => d,
            _ => i,
        };
    }

    parts
}

/// Directory part of `path`, `"."` when there is none.
pub fn dirname(path: &str) -> &str {
    let parts = split(path);
    if parts.dir_end == 0 {
        "."
    } else {
        parts.dir()
    }
}

/// Last component of `path`.
///
/// With `suffix` equal to `".*"` or to the path's own extension, the
/// extension is removed. A path made of nothing but its root gives one
/// separator from that root (`/` for `//`), or the root itself when it
/// has none.
pub fn basename<'a>(path: &'a str, suffix: Option<&str>) -> &'a str {
    let parts = split(path);
    if parts.name_end == 0 {
        return ".";
    }
    if parts.base_start == parts.name_end {
        let root = parts.root();
        return match root.bytes().position(|b| Flavor::NATIVE.is_separator(b)) {
            Some(i) => &root[i..=i],
            None => root,
        };
    }
    match suffix {
        Some(".*") => parts.stem(),
        Some(s) if parts.extname().unwrap_or("") == s => parts.stem(),
        _ => parts.basename(),
    }
}

/// Extension of `path` including the dot.
pub fn extname(path: &str) -> Option<&str> {
    split(path).extname()
}

/// Whether appending a component to `path` needs a separator first.
pub fn needs_separator(path: &str) -> bool {
    needs_separator_with(path, Flavor::NATIVE)
}

/// Whether appending a component to `path` needs a separator first.
///
/// True for the empty path and for any path whose last byte is not a
/// separator. A bare root (`/`, `C:`, `//server/`) never needs one, so
/// `C:` joined with `x` stays drive-relative.
pub fn needs_separator_with(path: &str, flavor: Flavor) -> bool {
    let bytes = path.as_bytes();
    match bytes.last() {
        None => true,
        Some(&last) => flavor.skip_root(bytes) < bytes.len() && !flavor.is_separator(last),
    }
}

/// Append `/` to `path` unless it already ends in a separator.
pub fn ensure_trailing_separator(path: &mut String) {
    if needs_separator(path) {
        path.push('/');
    }
}

/// One argument of [`join`]: a string or a nested sequence of arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart<'a> {
    /// A path string
    Str(Cow<'a, str>),
    /// A nested sequence, flattened in order
    Seq(Vec<PathPart<'a>>),
}

impl<'a> From<&'a str> for PathPart<'a> {
    fn from(s: &'a str) -> Self {
        PathPart::Str(Cow::Borrowed(s))
    }
}

impl From<String> for PathPart<'_> {
    fn from(s: String) -> Self {
        PathPart::Str(Cow::Owned(s))
    }
}

impl<'a> From<&'a String> for PathPart<'a> {
    fn from(s: &'a String) -> Self {
        PathPart::Str(Cow::Borrowed(s.as_str()))
    }
}

impl<'a> From<&'a Path> for PathPart<'a> {
    fn from(p: &'a Path) -> Self {
        PathPart::Str(p.to_string_lossy())
    }
}

impl<'a> From<&'a PathBuf> for PathPart<'a> {
    fn from(p: &'a PathBuf) -> Self {
        PathPart::Str(p.to_string_lossy())
    }
}

impl<'a, T: Into<PathPart<'a>>> From<Vec<T>> for PathPart<'a> {
    fn from(items: Vec<T>) -> Self {
        PathPart::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<'a, T: Into<PathPart<'a>>, const N: usize> From<[T; N]> for PathPart<'a> {
    fn from(items: [T; N]) -> Self {
        PathPart::Seq(items.into_iter().map(Into::into).collect())
    }
}

/// Join path parts with exactly one `/` between them.
///
/// Nested sequences are flattened. A single string argument is returned
/// as is, without copying. No arguments yield the empty string.
pub fn join<'a, I, P>(parts: I) -> Cow<'a, str>
where
    I: IntoIterator<Item = P>,
    P: Into<PathPart<'a>>,
{
    join_with(parts, Flavor::NATIVE)
}

/// [`join`] with an explicit flavor.
pub fn join_with<'a, I, P>(parts: I, flavor: Flavor) -> Cow<'a, str>
where
    I: IntoIterator<Item = P>,
    P: Into<PathPart<'a>>,
{
    let mut parts: Vec<PathPart<'a>> = parts.into_iter().map(Into::into).collect();
    match parts.len() {
        0 => return Cow::Borrowed(""),
        1 => match parts.pop() {
            Some(PathPart::Str(s)) => return s,
            Some(seq) => parts.push(seq),
            None => {}
        },
        _ => {}
    }

    let mut joiner = Joiner {
        out: String::new(),
        started: false,
        term_sep: false,
        flavor,
    };
    for part in &parts {
        joiner.push(part);
    }
    Cow::Owned(joiner.out)
}

struct Joiner {
    out: String,
    started: bool,
    /// Whether the last emitted byte is a separator
    term_sep: bool,
    flavor: Flavor,
}

impl Joiner {
    fn push(&mut self, part: &PathPart<'_>) {
        match part {
            PathPart::Seq(items) => {
                for item in items {
                    self.push(item);
                }
            }
            PathPart::Str(s) => self.push_str(s),
        }
    }

    fn push_str(&mut self, s: &str) {
        if !self.started {
            self.started = true;
            self.term_sep = !needs_separator_with(s, self.flavor);
            self.out.push_str(s);
            return;
        }
        if s.is_empty() {
            return;
        }

        let flavor = self.flavor;
        let trimmed = s.trim_start_matches(|c: char| c.is_ascii() && flavor.is_separator(c as u8));
        if !self.term_sep {
            self.out.push('/');
            self.term_sep = true;
        }
        if let Some(&last) = trimmed.as_bytes().last() {
            self.out.push_str(trimmed);
            self.term_sep = flavor.is_separator(last);
        }
    }
}
