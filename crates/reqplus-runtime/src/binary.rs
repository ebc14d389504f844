//! Bytecode header validation
//!
//! Only the header is checked here; decoding the rest is the host's job.
//!
//! ```text
//! offset  size  field
//!      0     4  ident              (not interpreted)
//!      4     4  version tag        must equal HostRuntime::binary_version()
//!      8     2  crc                (not interpreted)
//!     10     4  total size         big-endian, header included
//!     14     4  compiler name      (not interpreted)
//!     18     4  compiler version   (not interpreted)
//! ```

use std::ops::Range;

use reqplus_sdk::BinaryVersion;

use crate::error::LoadError;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 22;

const VERSION: Range<usize> = 4..8;
const TOTAL_SIZE: Range<usize> = 10..14;

/// Read-only view over a header at the start of a caller's buffer.
#[derive(Debug, Clone, Copy)]
pub struct BinaryHeader<'a> {
    bytes: &'a [u8],
}

impl<'a> BinaryHeader<'a> {
    /// View the header of `buf`, or `None` if `buf` is shorter than it.
    pub fn view(buf: &'a [u8]) -> Option<Self> {
        buf.get(..HEADER_SIZE).map(|bytes| BinaryHeader { bytes })
    }

    /// The version tag.
    pub fn version(&self) -> BinaryVersion {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.bytes[VERSION]);
        tag
    }

    /// Declared size of the whole image, header included.
    pub fn total_size(&self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[TOTAL_SIZE]);
        u32::from_be_bytes(raw)
    }
}

/// Check that `buf` holds a complete image of the expected version.
///
/// `name` is only used in the error message.
pub fn validate(buf: &[u8], expected: &BinaryVersion, name: &str) -> Result<(), LoadError> {
    let header = BinaryHeader::view(buf).ok_or_else(|| LoadError::WrongBinarySize {
        name: name.to_string(),
    })?;

    if (buf.len() as u64) < u64::from(header.total_size()) {
        return Err(LoadError::WrongBinarySize {
            name: name.to_string(),
        });
    }

    let actual = header.version();
    if &actual != expected {
        return Err(LoadError::WrongBinaryVersion {
            name: name.to_string(),
            expected: String::from_utf8_lossy(expected).into_owned(),
            actual: String::from_utf8_lossy(&actual).into_owned(),
        });
    }

    Ok(())
}

/// Borrow a complete image starting at `ptr`, sized by its own header.
///
/// # Safety
///
/// `ptr` must point to a readable header followed by at least as many bytes
/// as the header declares, valid for `'a`. Used for images exported by a
/// linked native module, whose library must stay linked for `'a`.
pub unsafe fn trusted_image<'a>(ptr: *const u8) -> &'a [u8] {
    let header = std::slice::from_raw_parts(ptr, HEADER_SIZE);
    let total = BinaryHeader { bytes: header }.total_size() as usize;
    std::slice::from_raw_parts(ptr, total.max(HEADER_SIZE))
}
