//! Core identifiers, the on-disk needle offset unit, and CRC32 for `haystack`.
//!
//! This crate has no I/O. It holds the small, `Copy`-friendly value types
//! shared across the storage engine, placement layer, and replicated write
//! path: [`VolumeId`], [`FileId`], [`Cookie`], and the [`crc32`] checksum
//! used to validate every needle's `Data`.

mod crc32;
mod file_id;
mod volume_id;

pub use crc32::crc32;
pub use file_id::{FileId, ParseFileIdError};
pub use volume_id::{ParseVolumeIdError, VolumeId};

/// Random per-write capability token. A read must present the matching
/// cookie for the needle at the given offset, or the read is rejected.
pub type Cookie = u32;

/// Number of bytes in one padding block. Every on-disk needle's total size
/// is a multiple of this, and a [`FileId`]'s offset is expressed in units
/// of it rather than in raw bytes.
pub const PADDING_BLOCK: u64 = 8;

/// Converts a byte position to the padding-block offset stored in a
/// [`FileId`]/needle header.
///
/// # Panics
///
/// Panics in debug builds if `byte_position` is not aligned to
/// [`PADDING_BLOCK`].
pub fn offset_from_byte_position(byte_position: u64) -> u64 {
    debug_assert_eq!(
        byte_position % PADDING_BLOCK,
        0,
        "byte position {byte_position} is not 8-byte aligned"
    );
    byte_position / PADDING_BLOCK
}

/// Converts a padding-block offset back to a byte position.
pub fn byte_position_from_offset(offset: u64) -> u64 {
    offset * PADDING_BLOCK
}
