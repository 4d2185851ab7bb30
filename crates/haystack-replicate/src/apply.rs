//! `Apply`: the callback every replica runs, deterministically, against
//! its local [`Store`].

use haystack_storage::Needle;
use haystack_store::Store;
use tracing::info;

use crate::command::{WriteCommand, WriteRes};
use crate::error::{ReplicateError, ReplicateResult};

/// Runs one committed [`WriteCommand`] against `store`.
///
/// 1. Resolve `Vid` → volume. Missing volume is an error every replica
///    must agree on (§4.4) — it is never silently skipped.
/// 2. Decode the needle payload, verifying its checksum.
/// 3. Call `Volume::write` (via `Store::write`), which handles both the
///    fresh-append and idempotent-replay cases.
/// 4. Return `WriteRes` with the offset and size the write actually got.
pub fn apply(store: &mut Store, command: &WriteCommand) -> ReplicateResult<WriteRes> {
    if !store.has_volume(command.vid) {
        return Err(ReplicateError::NoVolume(command.vid));
    }

    let needle = Needle::decode_payload(&command.encoded_needle)?;
    let cookie = needle.cookie;

    let (offset, size) = store.write(command.vid, needle)?;
    info!(volume = %command.vid, offset, size, "applied write command");

    Ok(WriteRes {
        vid: command.vid,
        cookie,
        offset,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use haystack_store::DiskLocation;
    use haystack_types::VolumeId;
    use tempfile::tempdir;

    fn store_with_volume(vid: u32) -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let mut location = DiskLocation::new(dir.path()).unwrap();
        location.add_volume(VolumeId::new(vid), "photo").unwrap();
        (dir, Store::new(vec![location], vec![VolumeId::new(vid)]))
    }

    #[test]
    fn applies_a_fresh_write() {
        let (_dir, mut store) = store_with_volume(1);
        let needle = Needle::new(9, b"payload".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(1), &needle);

        let res = apply(&mut store, &command).unwrap();
        assert_eq!(res.vid, VolumeId::new(1));
        assert_eq!(res.cookie, 9);
        assert_eq!(res.offset, 0);

        let read_back = store.read(VolumeId::new(1), res.offset, res.size, 9).unwrap();
        assert_eq!(read_back.data, b"payload");
    }

    #[test]
    fn applying_the_same_command_twice_is_idempotent() {
        let (_dir, mut store) = store_with_volume(1);
        let needle = Needle::new(9, b"payload".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(1), &needle);

        let first = apply(&mut store, &command).unwrap();
        let second = apply(&mut store, &command).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn applying_against_a_missing_volume_is_an_error() {
        let (_dir, mut store) = store_with_volume(1);
        let needle = Needle::new(9, b"payload".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(99), &needle);

        let err = apply(&mut store, &command).unwrap_err();
        assert!(matches!(err, ReplicateError::NoVolume(_)));
    }

    /// Applying the same sequence of encoded commands against two
    /// independent stores started from identical empty volumes must
    /// produce byte-identical `.dat` files (§8 "Replica determinism").
    #[test]
    fn identical_command_sequences_produce_byte_identical_volumes() {
        let (leader_dir, mut leader) = store_with_volume(1);
        let (follower_dir, mut follower) = store_with_volume(1);

        let commands: Vec<WriteCommand> = [
            Needle::new(1, b"first".to_vec()).unwrap(),
            Needle::new(2, b"second payload".to_vec()).unwrap().with_name(b"f.bin".to_vec()),
            Needle::tombstone(1),
        ]
        .iter()
        .map(|needle| WriteCommand::new(VolumeId::new(1), needle))
        .collect();

        for command in &commands {
            let encoded = command.encode();
            let decoded = WriteCommand::decode(&encoded).unwrap();
            apply(&mut leader, &decoded).unwrap();
            apply(&mut follower, &decoded).unwrap();
        }

        let leader_bytes = std::fs::read(leader_dir.path().join("photo_1.dat")).unwrap();
        let follower_bytes = std::fs::read(follower_dir.path().join("photo_1.dat")).unwrap();
        assert_eq!(leader_bytes, follower_bytes);
    }
}
