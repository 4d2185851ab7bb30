//! Disk locations, volume placement, and startup discovery.
//!
//! A [`Store`] owns an ordered list of [`DiskLocation`]s and the
//! round-robin counter used by [`Store::free_volume`] to pick where the
//! next write lands. Each `DiskLocation` owns a directory and the
//! [`haystack_storage::Volume`]s loaded from it, either at startup
//! ([`DiskLocation::discover`]) or via [`Store::add_volume`].
//!
//! This crate has no notion of replication — it is the thing a replicated
//! write command (see `haystack-replicate`) is applied against.

mod disk_location;
mod error;
mod store;

pub use disk_location::DiskLocation;
pub use error::{StoreError, StoreResult};
pub use store::Store;
