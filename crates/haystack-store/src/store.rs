//! The store: an ordered list of disk locations plus round-robin placement.

use std::sync::atomic::{AtomicU32, Ordering};

use haystack_storage::Needle;
use haystack_types::VolumeId;
use tracing::info;

use crate::disk_location::DiskLocation;
use crate::error::{StoreError, StoreResult};

/// The set of disk locations a server manages, plus the placement counter
/// used by [`Store::free_volume`].
///
/// `counter` is the only piece of store-wide mutable state; volume
/// lookups read an immutable set of locations once startup discovery and
/// any `add_volume` calls are done.
#[derive(Debug)]
pub struct Store {
    locations: Vec<DiskLocation>,
    /// Volume ids eligible for round-robin placement, in the order
    /// `free_volume` cycles through them. Configuration, not a literal
    /// constant — see `Config::bootstrap_volumes`.
    placement_set: Vec<VolumeId>,
    counter: AtomicU32,
}

impl Store {
    pub fn new(locations: Vec<DiskLocation>, placement_set: Vec<VolumeId>) -> Self {
        Self {
            locations,
            placement_set,
            counter: AtomicU32::new(0),
        }
    }

    /// Runs startup discovery (§4.3) against every configured location.
    pub fn discover(&mut self) -> StoreResult<()> {
        for location in &mut self.locations {
            location.discover()?;
        }
        Ok(())
    }

    /// Creates each volume named in `ids` (skipping duplicates is an
    /// error, not silently ignored — `AddVolume` is not atomic across the
    /// list: an earlier volume in the list may already have been created
    /// by the time a later one fails).
    ///
    /// The source picks the first disk location unconditionally; this
    /// implementation preserves that as a documented stub rather than
    /// silently adding unrequested multi-location balancing (see
    /// `find_free_location`).
    pub fn add_volume(&mut self, ids: &[VolumeId], collection: &str) -> StoreResult<()> {
        for &id in ids {
            let location = self.find_free_location()?;
            location.add_volume(id, collection)?;
            info!(volume = %id, collection = %collection, "added volume");
        }
        Ok(())
    }

    /// Picks the disk location that should host a newly created volume.
    /// Always the first configured location — multi-location, least-free
    /// space placement is an explicit extension this crate does not
    /// implement (see DESIGN.md).
    fn find_free_location(&mut self) -> StoreResult<&mut DiskLocation> {
        self.locations.first_mut().ok_or(StoreError::NoDiskLocation)
    }

    pub fn has_volume(&self, id: VolumeId) -> bool {
        self.locations.iter().any(|loc| loc.contains(id))
    }

    fn find_location_mut(&mut self, id: VolumeId) -> Option<&mut DiskLocation> {
        self.locations.iter_mut().find(|loc| loc.contains(id))
    }

    /// Round-robin volume selection across the configured placement set:
    /// `placement_set[counter % len]`, incrementing `counter` after the
    /// read. With the default bootstrap set `[1, 2, 3]` and `counter`
    /// starting at 0, the first call returns volume 1.
    pub fn free_volume(&self) -> VolumeId {
        let len = self.placement_set.len() as u32;
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % len;
        self.placement_set[index as usize]
    }

    /// Writes `needle` to volume `id`, returning `(offset, size)` it was
    /// (or already had been) assigned.
    pub fn write(&mut self, id: VolumeId, needle: Needle) -> StoreResult<(u64, u32)> {
        let location = self.find_location_mut(id).ok_or(StoreError::NoVolume(id))?;
        let volume = location.volume_mut(id).ok_or(StoreError::NoVolume(id))?;
        Ok(volume.write(needle)?)
    }

    pub fn read(&mut self, id: VolumeId, offset: u64, size: u32, cookie: u32) -> StoreResult<Needle> {
        let location = self.find_location_mut(id).ok_or(StoreError::NoVolume(id))?;
        let volume = location.volume_mut(id).ok_or(StoreError::NoVolume(id))?;
        Ok(volume.read(offset, size, cookie)?)
    }

    pub fn delete(&mut self, id: VolumeId, cookie: u32) -> StoreResult<(u64, u32)> {
        let location = self.find_location_mut(id).ok_or(StoreError::NoVolume(id))?;
        let volume = location.volume_mut(id).ok_or(StoreError::NoVolume(id))?;
        Ok(volume.delete(cookie)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_store(vids: &[u32]) -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let mut location = DiskLocation::new(dir.path()).unwrap();
        for &v in vids {
            location.add_volume(VolumeId::new(v), "photo").unwrap();
        }
        let placement_set: Vec<VolumeId> = vids.iter().map(|&v| VolumeId::new(v)).collect();
        (dir, Store::new(vec![location], placement_set))
    }

    #[test]
    fn free_volume_starts_at_one_with_default_bootstrap_set() {
        let (_dir, store) = new_store(&[1, 2, 3]);
        assert_eq!(store.free_volume(), VolumeId::new(1));
        assert_eq!(store.free_volume(), VolumeId::new(2));
        assert_eq!(store.free_volume(), VolumeId::new(3));
        assert_eq!(store.free_volume(), VolumeId::new(1));
    }

    #[test]
    fn free_volume_distributes_evenly_over_n_calls() {
        let (_dir, store) = new_store(&[1, 2, 3]);
        let mut counts = [0u32; 3];
        for _ in 0..100 {
            let vid = store.free_volume().as_u32();
            counts[(vid - 1) as usize] += 1;
        }
        for count in counts {
            assert!((33..=34).contains(&count));
        }
    }

    #[test]
    fn write_to_missing_volume_is_no_volume_error() {
        let (_dir, mut store) = new_store(&[1]);
        let needle = haystack_storage::Needle::new(1, b"x".to_vec()).unwrap();
        let err = store.write(VolumeId::new(99), needle).unwrap_err();
        assert!(matches!(err, StoreError::NoVolume(_)));
    }
}
