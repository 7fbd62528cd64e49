//! Firmware image descriptor layout.
//!
//! An ESP application image starts with a 24-byte image header and an 8-byte
//! segment header, followed by the 256-byte application descriptor.  The
//! descriptor carries the version string as a 32-byte NUL-padded field at
//! byte 16 (after the magic word, secure version, and reserved words).
//!
//! The download worker peeks into the first sufficiently large chunk to pull
//! the version out before any further flash writes happen.

use super::FirmwareVersion;

/// ESP image header length.
pub const IMAGE_HEADER_LEN: usize = 24;
/// First segment header length.
pub const SEGMENT_HEADER_LEN: usize = 8;
/// Application descriptor length.
pub const APP_DESC_LEN: usize = 256;

/// Byte offset of the application descriptor within the image.
pub const APP_DESC_OFFSET: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN;
/// A chunk must span this many bytes before the descriptor can be read.
pub const DESCRIPTOR_SPAN: usize = APP_DESC_OFFSET + APP_DESC_LEN;

/// Offset of the version field within the descriptor.
pub const VERSION_FIELD_OFFSET: usize = 16;
/// Length of the NUL-padded version field.
pub const VERSION_FIELD_LEN: usize = 32;

/// Extract the embedded version string from the leading bytes of an image.
///
/// Returns `None` when `head` is too short to span the descriptor — the
/// caller retries on the next chunk.  A version field that is not valid
/// UTF-8 yields an empty version.
pub fn descriptor_version(head: &[u8]) -> Option<FirmwareVersion> {
    if head.len() < DESCRIPTOR_SPAN {
        return None;
    }

    let start = APP_DESC_OFFSET + VERSION_FIELD_OFFSET;
    let field = &head[start..start + VERSION_FIELD_LEN];
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());

    let mut version = FirmwareVersion::new();
    if let Ok(text) = core::str::from_utf8(&field[..len]) {
        // Cannot overflow: the field is exactly the string's capacity.
        let _ = version.push_str(text);
    }
    Some(version)
}
