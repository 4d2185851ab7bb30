//! Append-only needle/volume storage engine.
//!
//! A [`Volume`] is a single `.dat` file holding many [`Needle`]s, each
//! framed with a small header, an optional name/mime/last-modified
//! section, and a CRC32 checksum. Writes are append-only; deletes append
//! a tombstone rather than reclaiming space. See [`needle`] for the exact
//! on-disk layout.
//!
//! This crate has no notion of which volume a write should land on, and
//! no notion of replication — both live one layer up, in the placement
//! and replicated-write crates. It only knows how to frame, append, and
//! read back needles within a single file.

mod error;
mod needle;
mod volume;

pub use error::{StorageError, StorageResult};
pub use needle::{Needle, CHECKSUM_SIZE, FLAG_GZIP, FLAG_HAS_LAST_MODIFIED, FLAG_HAS_MIME, FLAG_HAS_NAME, HEADER_SIZE};
pub use volume::{data_file_path, Volume};
