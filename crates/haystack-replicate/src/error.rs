//! Replicated write command and consensus-collaborator error types.

use haystack_types::VolumeId;
use thiserror::Error;

pub type ReplicateResult<T> = Result<T, ReplicateError>;

#[derive(Debug, Error)]
pub enum ReplicateError {
    /// `Apply` was asked for a volume id no replica loaded at startup.
    /// Every replica must agree on this outcome — see §4.4's determinism
    /// contract.
    #[error("no volume {0}")]
    NoVolume(VolumeId),

    /// The command's encoded bytes were shorter than the fixed `Vid`
    /// prefix, or the needle payload inside them failed to decode.
    #[error("malformed write command: {0}")]
    MalformedCommand(String),

    #[error(transparent)]
    Storage(#[from] haystack_storage::StorageError),

    #[error(transparent)]
    Store(#[from] haystack_store::StoreError),

    /// This node is not the leader; the caller should retry against the
    /// address returned.
    #[error("not leader, current leader is {0:?}")]
    NotLeader(Option<String>),
}
