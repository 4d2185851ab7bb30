//! Storage engine error types.

use thiserror::Error;

/// Result type for storage engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while encoding, decoding, or persisting a needle.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The read came up short of a full header/body — truncated file or bad offset.
    #[error("entry not found")]
    NotFound,

    /// The needle at the requested offset doesn't match the requested
    /// `(size, cookie)`. This is the capability check: guessing an offset
    /// without the cookie does not grant a read.
    #[error("cookie mismatch")]
    CapabilityMismatch,

    /// The stored checksum doesn't match `crc32(Data)`.
    #[error("CRC error")]
    Corruption,

    /// Write or delete attempted on a read-only volume.
    #[error("volume is read-only")]
    ReadOnly,

    /// A needle's `Data` was empty but it was not presented as a tombstone.
    #[error("data size must be greater than zero for a live needle")]
    EmptyData,

    /// Underlying file I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
