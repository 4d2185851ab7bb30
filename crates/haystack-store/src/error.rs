//! Placement and disk-location error types.

use haystack_types::VolumeId;
use thiserror::Error;

/// Result type for store-level operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `Apply` (or a direct read/write) was asked for a volume this store
    /// has never heard of. Every replica must agree on this outcome; a
    /// divergence here is an operator problem, not one this crate can
    /// repair.
    #[error("no volume {0}")]
    NoVolume(VolumeId),

    /// `AddVolume` was asked to create a volume id that's already loaded.
    #[error("volume {0} already exists")]
    VolumeAlreadyExists(VolumeId),

    /// No configured disk location could accept a new volume.
    #[error("no disk location available to host a new volume")]
    NoDiskLocation,

    #[error(transparent)]
    Storage(#[from] haystack_storage::StorageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
