//! Persistence Module
//!
//! Point-in-time snapshots of cache contents on local disk.

mod codec;
mod disk;

pub use codec::{Snapshot, SnapshotCodec, SnapshotMode, SNAPSHOT_VERSION};
pub use disk::{SnapshotFile, DEFAULT_SNAPSHOT_FILE};
