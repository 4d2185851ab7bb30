//! A single append-only `.dat` file holding many needles.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use haystack_types::{byte_position_from_offset, offset_from_byte_position, Cookie, VolumeId};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::needle::Needle;

/// One volume: an append-only `.dat` file plus the bookkeeping needed to
/// place the next write and to classify the volume read-write or
/// read-only at open time.
///
/// A volume never rewrites or deletes bytes in place — a delete appends a
/// tombstone, and the space occupied by superseded needles is only
/// reclaimed by an (out-of-scope) offline compaction pass.
#[derive(Debug)]
pub struct Volume {
    id: VolumeId,
    collection: String,
    path: PathBuf,
    file: File,
    /// Byte length of the file the last time it was known to be
    /// consistent; used to truncate back on a failed append.
    file_size: u64,
    read_only: bool,
    /// `(offset, size, cookie)` of the most recently appended needle, kept
    /// up to date on every successful `write` so a replay check never has
    /// to rescan the file. `None` for an empty volume.
    tail: Option<(u64, u32, Cookie)>,
}

impl Volume {
    /// Opens (or creates) the volume's `.dat` file at `dir`, named
    /// `<collection>_<id>.dat`, or `<id>.dat` when `collection` is empty.
    ///
    /// The volume is classified read-only if the file exists and is not
    /// writable by this process; a brand-new file is always read-write.
    pub fn open(dir: &Path, id: VolumeId, collection: &str) -> StorageResult<Self> {
        let path = data_file_path(dir, id, collection);
        let existed = path.exists();

        let mut open_options = OpenOptions::new();
        open_options.read(true).create(true).append(false).write(true);
        let file = match open_options.open(&path) {
            Ok(file) => file,
            Err(_) if existed => {
                warn!(volume = %id, path = %path.display(), "opening volume read-only");
                let mut file = OpenOptions::new().read(true).open(&path)?;
                let file_size = file.metadata()?.len();
                let tail = scan_tail(&mut file, file_size)?;
                return Ok(Self {
                    id,
                    collection: collection.to_string(),
                    path,
                    file,
                    file_size,
                    read_only: true,
                    tail,
                });
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let file_size = file.metadata()?.len();
        let tail = scan_tail(&mut file, file_size)?;
        info!(volume = %id, path = %path.display(), size = file_size, "opened volume");
        Ok(Self {
            id,
            collection: collection.to_string(),
            path,
            file,
            file_size,
            read_only: false,
            tail,
        })
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// Appends `needle` at the next 8-byte-aligned position, assigning its
    /// `offset` field, and returns the framed `Size` of the stored needle
    /// (the same value a subsequent read must present to succeed).
    ///
    /// If the same `(cookie, data)` pair was already the most recently
    /// written needle at this volume's tail (a retried upload, or a
    /// replayed replicated command), the existing needle is left
    /// untouched and its `(offset, size)` are returned without writing
    /// anything — this is what makes replaying a committed write command
    /// after a crash safe. Returns `(offset, size)` in both the no-op and
    /// fresh-append cases, offset in padding-block units.
    pub fn write(&mut self, mut needle: Needle) -> StorageResult<(u64, u32)> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        if let Some((existing_offset, existing_size)) = self.unchanged_tail_needle(&needle)? {
            debug!(volume = %self.id, cookie = needle.cookie, "write is a no-op replay of the current tail");
            return Ok((existing_offset, existing_size));
        }

        let aligned_offset = self.file_size;
        debug_assert_eq!(aligned_offset % haystack_types::PADDING_BLOCK, 0);
        needle.offset = offset_from_byte_position(aligned_offset);

        self.file.seek(SeekFrom::Start(aligned_offset))?;
        if let Err(e) = needle.append_to(&mut self.file) {
            self.file.set_len(self.file_size)?;
            self.file.seek(SeekFrom::Start(self.file_size))?;
            return Err(e);
        }

        self.file_size = aligned_offset + needle.disk_size();
        self.tail = Some((needle.offset, needle.size, needle.cookie));
        Ok((needle.offset, needle.size))
    }

    /// Appends a delete tombstone for `cookie` and returns `(offset,
    /// size)` of the tombstone written.
    ///
    /// This does not reclaim the space occupied by the live needle; a
    /// subsequent `read` for the same `(offset, size, cookie)` will still
    /// find the tombstone (size 0) rather than live data, which is enough
    /// for the contract: reads of deleted needles fail.
    pub fn delete(&mut self, cookie: Cookie) -> StorageResult<(u64, u32)> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let tombstone = Needle::tombstone(cookie);
        self.write(tombstone)
    }

    /// Reads back the needle at `offset` (in padding-block units),
    /// verifying it matches `(size, cookie)`.
    pub fn read(&mut self, offset: u64, size: u32, cookie: Cookie) -> StorageResult<Needle> {
        let byte_position = byte_position_from_offset(offset);
        self.file.seek(SeekFrom::Start(byte_position))?;
        let needle = Needle::read_from(&mut self.file, size, cookie)?;
        if needle.is_tombstone() {
            return Err(StorageError::NotFound);
        }
        Ok(needle)
    }

    /// `true` if the current tail of the file is already exactly this
    /// `(cookie, data)` pair — the one case where `write` is a safe no-op.
    /// Returns `(offset, size)` of that existing needle when it matches.
    ///
    /// O(1): consults the cached `tail` rather than rescanning the file,
    /// then reads back just that one needle to compare `data`.
    fn unchanged_tail_needle(&mut self, candidate: &Needle) -> StorageResult<Option<(u64, u32)>> {
        let Some((last_offset, last_size, last_cookie)) = self.tail else {
            return Ok(None);
        };

        if last_cookie != candidate.cookie {
            return Ok(None);
        }

        self.file
            .seek(SeekFrom::Start(byte_position_from_offset(last_offset)))?;
        let existing = match Needle::read_from(&mut self.file, last_size, last_cookie) {
            Ok(n) => n,
            Err(_) => return Ok(None),
        };

        if existing.data == candidate.data {
            Ok(Some((last_offset, existing.size)))
        } else {
            Ok(None)
        }
    }
}

/// Scans the whole file once, forward from the start, to find the
/// `(offset, size, cookie)` of the last needle — used only at `open` time
/// to seed `Volume::tail`, since we don't keep a standing index in this
/// crate (that's the placement layer's concern for a production
/// deployment). Every write after open keeps `tail` current itself, so
/// this never runs again on the hot path.
fn scan_tail(file: &mut File, file_size: u64) -> StorageResult<Option<(u64, u32, Cookie)>> {
    if file_size == 0 {
        return Ok(None);
    }

    file.seek(SeekFrom::Start(0))?;
    let mut tail = None;
    loop {
        let position = file.stream_position()?;
        if position >= file_size {
            break;
        }
        match Needle::read_header_only(file) {
            Ok((cookie, offset, size, body_length)) => {
                tail = Some((offset, size, cookie));
                file.seek(SeekFrom::Start(position + u64::from(crate::needle::HEADER_SIZE) + body_length))?;
            }
            Err(StorageError::NotFound) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(tail)
}

/// Constructs the canonical `.dat` path for a volume: `<collection>_<id>.dat`
/// when `collection` is non-empty, else `<id>.dat`.
pub fn data_file_path(dir: &Path, id: VolumeId, collection: &str) -> PathBuf {
    let file_name = if collection.is_empty() {
        format!("{}.dat", id.as_u32())
    } else {
        format!("{collection}_{}.dat", id.as_u32())
    };
    dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();

        let needle = Needle::new(7, b"hello world".to_vec()).unwrap();
        let (offset, size) = volume.write(needle).unwrap();

        let read = volume.read(offset, size, 7).unwrap();
        assert_eq!(read.data, b"hello world");
    }

    #[test]
    fn second_write_lands_after_first_and_is_8_byte_aligned() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();

        volume.write(Needle::new(1, b"aaa".to_vec()).unwrap()).unwrap();
        let first_size = volume.size();
        assert_eq!(first_size % haystack_types::PADDING_BLOCK, 0);

        volume.write(Needle::new(2, b"bbbbb".to_vec()).unwrap()).unwrap();
        assert!(volume.size() > first_size);
        assert_eq!(volume.size() % haystack_types::PADDING_BLOCK, 0);
    }

    #[test]
    fn wrong_cookie_on_read_fails() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
        let needle = Needle::new(7, b"secret".to_vec()).unwrap();
        let (offset, size) = volume.write(needle).unwrap();

        let err = volume.read(offset, size, 8).unwrap_err();
        assert!(matches!(err, StorageError::CapabilityMismatch));
    }

    #[test]
    fn delete_then_read_is_not_found() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
        let needle = Needle::new(7, b"gone soon".to_vec()).unwrap();
        let (offset, size) = volume.write(needle).unwrap();

        volume.delete(7).unwrap();
        let err = volume.read(offset, size, 7).unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn replaying_the_same_tail_write_is_a_no_op() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();

        let (offset1, size1) = volume.write(Needle::new(1, b"payload".to_vec()).unwrap()).unwrap();
        let size_after_first = volume.size();

        // Same cookie, same data: this is the idempotent-replay case.
        let (offset2, size2) = volume.write(Needle::new(1, b"payload".to_vec()).unwrap()).unwrap();
        assert_eq!(size1, size2);
        assert_eq!(offset1, offset2);
        assert_eq!(volume.size(), size_after_first, "replay must not append a new needle");
    }

    #[test]
    fn reopening_a_volume_seeds_the_tail_for_replay_detection() {
        let dir = tempdir().unwrap();
        let (offset, size, size_on_disk) = {
            let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
            volume.write(Needle::new(1, b"first".to_vec()).unwrap()).unwrap();
            let (offset, size) = volume.write(Needle::new(2, b"payload".to_vec()).unwrap()).unwrap();
            (offset, size, volume.size())
        };

        let mut reopened = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
        let (replay_offset, replay_size) = reopened.write(Needle::new(2, b"payload".to_vec()).unwrap()).unwrap();
        assert_eq!((replay_offset, replay_size), (offset, size));
        assert_eq!(reopened.size(), size_on_disk, "replay after reopen must not append a new needle");
    }

    #[test]
    fn write_to_read_only_volume_fails() {
        let dir = tempdir().unwrap();
        {
            let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
            volume.write(Needle::new(1, b"x".to_vec()).unwrap()).unwrap();
        }

        let path = data_file_path(dir.path(), VolumeId::new(1), "");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        let mut volume = Volume::open(dir.path(), VolumeId::new(1), "").unwrap();
        assert!(volume.is_read_only());
        let err = volume.write(Needle::new(2, b"y".to_vec()).unwrap()).unwrap_err();
        assert!(matches!(err, StorageError::ReadOnly));

        // Restore so tempdir cleanup can remove the file.
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(false);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    #[test]
    fn collection_named_volume_uses_prefixed_filename() {
        let dir = tempdir().unwrap();
        let _volume = Volume::open(dir.path(), VolumeId::new(3), "photos").unwrap();
        assert!(dir.path().join("photos_3.dat").exists());
    }
}
