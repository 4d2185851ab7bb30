//! A single directory holding some set of volumes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use haystack_storage::Volume;
use haystack_types::VolumeId;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};

/// One filesystem directory plus the volumes loaded from it.
///
/// Each [`Volume`] is exclusively owned by exactly one `DiskLocation`; the
/// map is populated at [`DiskLocation::discover`] time and by
/// [`DiskLocation::add_volume`], and is otherwise read-only once the
/// server reaches steady state.
#[derive(Debug)]
pub struct DiskLocation {
    dir: PathBuf,
    volumes: BTreeMap<VolumeId, Volume>,
}

impl DiskLocation {
    /// Opens `dir` (creating it if absent) with no volumes loaded yet.
    /// Call [`Self::discover`] to pick up any `.dat` files already there.
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            volumes: BTreeMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn volume(&self, id: VolumeId) -> Option<&Volume> {
        self.volumes.get(&id)
    }

    pub fn volume_mut(&mut self, id: VolumeId) -> Option<&mut Volume> {
        self.volumes.get_mut(&id)
    }

    pub fn contains(&self, id: VolumeId) -> bool {
        self.volumes.contains_key(&id)
    }

    pub fn volume_ids(&self) -> impl Iterator<Item = VolumeId> + '_ {
        self.volumes.keys().copied()
    }

    /// Scans `dir` for regular files ending in `.dat` and loads any whose
    /// base name parses as `"<collection>_<vid>"` or plain `"<vid>"` and
    /// isn't already loaded. Names that don't parse are skipped silently
    /// — this is how an operator's stray file in a volume directory is
    /// tolerated rather than fatal.
    pub fn discover(&mut self) -> StoreResult<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some((collection, id)) = parse_dat_filename(&path) else {
                continue;
            };
            if self.volumes.contains_key(&id) {
                continue;
            }
            let volume = Volume::open(&self.dir, id, &collection)?;
            info!(volume = %id, collection = %collection, "discovered volume at startup");
            self.volumes.insert(id, volume);
        }
        Ok(())
    }

    /// Creates and loads a fresh volume for `id`/`collection` in this
    /// location. Fails if a volume with this id is already loaded.
    pub fn add_volume(&mut self, id: VolumeId, collection: &str) -> StoreResult<()> {
        if self.volumes.contains_key(&id) {
            return Err(StoreError::VolumeAlreadyExists(id));
        }
        let volume = Volume::open(&self.dir, id, collection)?;
        self.volumes.insert(id, volume);
        Ok(())
    }
}

/// Parses `<collection>_<vid>.dat` or `<vid>.dat` into `(collection, vid)`,
/// where `collection` is `""` for the unprefixed form.
fn parse_dat_filename(path: &Path) -> Option<(String, VolumeId)> {
    if path.extension()?.to_str()? != "dat" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;

    if let Some((collection, vid_str)) = stem.split_once('_') {
        if let Ok(vid) = vid_str.parse::<u32>() {
            return Some((collection.to_string(), VolumeId::new(vid)));
        }
        warn!(file = %path.display(), "volume filename has an underscore but no parseable vid suffix");
        return None;
    }

    stem.parse::<u32>().ok().map(|vid| (String::new(), VolumeId::new(vid)))
}
