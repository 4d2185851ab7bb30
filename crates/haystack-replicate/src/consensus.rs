//! The pluggable consensus collaborator contract, and the one reference
//! implementation this crate ships.
//!
//! A production deployment replaces [`SoloLog`] with a real multi-node
//! Raft/VSR library behind the same [`ConsensusLog`] trait; nothing else
//! in this crate or in `haystack-server` needs to change.

use std::sync::Mutex;

use tracing::warn;

use crate::apply::apply;
use crate::command::{WriteCommand, WriteRes};
use crate::error::{ReplicateError, ReplicateResult};

/// What a consensus collaborator needs to expose to this store: submit a
/// command and block for its committed, applied result; report on
/// cluster membership; and start whatever transport it uses.
///
/// This collapses the source's separate `RegisterCommand` step into
/// construction — implementations are handed their apply target (a
/// [`haystack_store::Store`], in practice wrapped by a closure or a
/// small adapter type) up front rather than registering a callback after
/// the fact.
pub trait ConsensusLog: Send + Sync {
    /// Submits `command`, blocks until it is committed (whatever that
    /// means for this implementation — quorum, or nothing at all for a
    /// single node), applies it, and returns the result.
    ///
    /// Returns [`ReplicateError::NotLeader`] if this node cannot accept
    /// writes right now.
    fn do_command(&self, command: WriteCommand) -> ReplicateResult<WriteRes>;

    /// The current leader's connection string, or `None` if unknown.
    fn leader(&self) -> Option<String>;

    /// Other known cluster members.
    fn peers(&self) -> Vec<String>;

    /// `true` if this node's log has committed nothing yet.
    fn is_log_empty(&self) -> bool;

    /// Starts whatever background transport/networking this
    /// implementation needs. A no-op for [`SoloLog`].
    fn start(&self) -> ReplicateResult<()>;

    /// Reads a needle from the local store, bypassing the log entirely —
    /// reads never need to be replicated or ordered against writes (§5).
    fn read(
        &self,
        vid: haystack_types::VolumeId,
        offset: u64,
        size: u32,
        cookie: haystack_types::Cookie,
    ) -> ReplicateResult<haystack_storage::Needle>;

    /// Picks the volume a fresh write should target, via the underlying
    /// store's round-robin placement (§4.3). Resolved here, before
    /// `do_command`, because placement is the leader's job in the source
    /// — a follower that rejects the command with `NotLeader` never
    /// needed an answer anyway.
    fn free_volume(&self) -> haystack_types::VolumeId;
}

/// A single-node log that commits every command synchronously and
/// applies it inline, with no quorum and no network.
///
/// This is the seam §4.5 calls out: enough to exercise the full write
/// path end to end, and a known limitation — it holds no log at all, so
/// a restart has nothing to replay (see SPEC_FULL.md §8 scenario 6).
/// `is_log_empty` therefore reflects only whether this process instance
/// has applied anything, not durable history.
pub struct SoloLog {
    store: Mutex<haystack_store::Store>,
    applied_count: Mutex<u64>,
    self_address: String,
}

impl SoloLog {
    pub fn new(store: haystack_store::Store, self_address: impl Into<String>) -> Self {
        Self {
            store: Mutex::new(store),
            applied_count: Mutex::new(0),
            self_address: self_address.into(),
        }
    }
}

impl ConsensusLog for SoloLog {
    fn do_command(&self, command: WriteCommand) -> ReplicateResult<WriteRes> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let result = apply(&mut store, &command)?;
        *self.applied_count.lock().expect("counter mutex poisoned") += 1;
        Ok(result)
    }

    fn leader(&self) -> Option<String> {
        Some(self.self_address.clone())
    }

    fn peers(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_log_empty(&self) -> bool {
        *self.applied_count.lock().expect("counter mutex poisoned") == 0
    }

    fn start(&self) -> ReplicateResult<()> {
        Ok(())
    }

    fn read(
        &self,
        vid: haystack_types::VolumeId,
        offset: u64,
        size: u32,
        cookie: haystack_types::Cookie,
    ) -> ReplicateResult<haystack_storage::Needle> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        Ok(store.read(vid, offset, size, cookie)?)
    }

    fn free_volume(&self) -> haystack_types::VolumeId {
        let store = self.store.lock().expect("store mutex poisoned");
        store.free_volume()
    }
}

/// A stub used in tests and by `/join` handler tests to exercise the
/// follower-redirect path: it always reports itself as a follower of
/// some other address and rejects every command with `NotLeader`.
pub struct StubFollower {
    pub leader_address: Option<String>,
}

impl ConsensusLog for StubFollower {
    fn do_command(&self, _command: WriteCommand) -> ReplicateResult<WriteRes> {
        warn!(leader = ?self.leader_address, "rejecting write: not leader");
        Err(ReplicateError::NotLeader(self.leader_address.clone()))
    }

    fn leader(&self) -> Option<String> {
        self.leader_address.clone()
    }

    fn peers(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_log_empty(&self) -> bool {
        true
    }

    fn start(&self) -> ReplicateResult<()> {
        Ok(())
    }

    fn read(
        &self,
        vid: haystack_types::VolumeId,
        _offset: u64,
        _size: u32,
        _cookie: haystack_types::Cookie,
    ) -> ReplicateResult<haystack_storage::Needle> {
        Err(ReplicateError::NoVolume(vid))
    }

    fn free_volume(&self) -> haystack_types::VolumeId {
        // Never actually consulted: `do_command` always rejects before a
        // volume assignment would matter. Volume 0 is not a valid id any
        // real store would load.
        haystack_types::VolumeId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haystack_storage::Needle;
    use haystack_store::{DiskLocation, Store};
    use haystack_types::VolumeId;
    use tempfile::tempdir;

    fn solo_log_with_volume(vid: u32) -> (tempfile::TempDir, SoloLog) {
        let dir = tempdir().unwrap();
        let mut location = DiskLocation::new(dir.path()).unwrap();
        location.add_volume(VolumeId::new(vid), "photo").unwrap();
        let store = Store::new(vec![location], vec![VolumeId::new(vid)]);
        (dir, SoloLog::new(store, "localhost:4001"))
    }

    #[test]
    fn solo_log_commits_synchronously_and_reports_itself_as_leader() {
        let (_dir, log) = solo_log_with_volume(1);
        assert!(log.is_log_empty());
        assert_eq!(log.leader(), Some("localhost:4001".to_string()));
        assert!(log.peers().is_empty());

        let needle = Needle::new(5, b"hi".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(1), &needle);
        let res = log.do_command(command).unwrap();
        assert_eq!(res.cookie, 5);
        assert!(!log.is_log_empty());
    }

    #[test]
    fn stub_follower_rejects_writes() {
        let follower = StubFollower {
            leader_address: Some("leader:4001".to_string()),
        };
        let needle = Needle::new(1, b"x".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(1), &needle);
        let err = follower.do_command(command).unwrap_err();
        assert!(matches!(err, ReplicateError::NotLeader(Some(_))));
    }
}
