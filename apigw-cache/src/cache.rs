use tokio::sync::mpsc;

use apigw_core::TypeUrl;

use crate::watch::{DeltaResponseEnvelope, DeltaWatchRequest, ResponseEnvelope, WatchRequest};

/// Identifier of a registered watch within one cache. Ids are never reused
/// for the lifetime of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// The contract the combined cache multiplexes over. [`crate::LinearCache`]
/// is the production implementation; tests substitute their own to inject
/// faults.
pub trait DiscoveryCache: Send + Sync + 'static {
    /// The single type URL this cache serves.
    fn type_url(&self) -> &TypeUrl;

    /// Whether this cache can serve incremental watches. Caches that cannot
    /// are skipped by the combined delta path.
    fn supports_delta(&self) -> bool {
        true
    }

    /// Register a watch. If the cache's current state already differs from
    /// what the request claims to know, a response is enqueued before this
    /// returns. Sends are non-blocking; a full channel drops the response
    /// and the watch is retried on the next state transition.
    fn create_watch(&self, request: WatchRequest, tx: mpsc::Sender<ResponseEnvelope>) -> WatchId;

    fn create_delta_watch(
        &self,
        request: DeltaWatchRequest,
        tx: mpsc::Sender<DeltaResponseEnvelope>,
    ) -> WatchId;

    /// Deregister. Idempotent; unknown ids are ignored.
    fn cancel_watch(&self, id: WatchId);

    /// One-shot read of the current state for `request`'s subset.
    fn fetch(&self, request: &WatchRequest) -> Option<ResponseEnvelope>;

    /// Open watches of both kinds, for leak accounting.
    fn watch_count(&self) -> usize;
}
