//! The distribution core: per-type-URL linear snapshot caches, the snapshot
//! managers that feed them from the stores, and the combined cache that
//! fans N linear caches into one aggregated discovery session.

mod cache;
mod combined;
mod linear;
mod snapshot;
mod watch;

pub use cache::{DiscoveryCache, WatchId};
pub use combined::{CombinedCache, CombinedWatcher};
pub use linear::LinearCache;
pub use snapshot::SnapshotManager;
pub use watch::{DeltaResponseEnvelope, DeltaWatchRequest, ResponseEnvelope, WatchRequest};
