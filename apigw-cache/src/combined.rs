use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use apigw_core::{Error, Result, TypeUrl};
use apigw_telemetry::ControlPlaneMetrics;

use crate::cache::{DiscoveryCache, WatchId};
use crate::watch::{DeltaResponseEnvelope, DeltaWatchRequest, ResponseEnvelope, WatchRequest};

/// How long a forward to the downstream channel may block before the
/// response is dropped. The upstream cache re-sends on the next version
/// bump, so a drop costs latency, not convergence.
const DOWNSTREAM_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Capacity of each upstream watch channel. Small: the fan-in task drains
/// promptly unless the downstream itself is stuck.
const UPSTREAM_CHANNEL_CAPACITY: usize = 16;

type WatcherRegistry = Arc<Mutex<HashMap<u64, CancellationToken>>>;

/// Presents N linear caches, each serving a distinct type URL (or several
/// serving the same one), as a single aggregated discovery cache.
///
/// Owns watcher registration, the per-upstream fan-in tasks, response
/// deduplication, and cancellation propagation. The registry lock is never
/// held across a channel operation.
pub struct CombinedCache {
    caches: Vec<Arc<dyn DiscoveryCache>>,
    watchers: WatcherRegistry,
    next_watcher_id: AtomicU64,
    metrics: Arc<ControlPlaneMetrics>,
}

impl CombinedCache {
    pub fn new(caches: Vec<Arc<dyn DiscoveryCache>>, metrics: Arc<ControlPlaneMetrics>) -> Self {
        Self {
            caches,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watcher_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Register an aggregated state-of-the-world watch. The request is
    /// routed to every underlying cache serving its type URL; a request with
    /// an empty type URL (startup negotiation) is broadcast to all caches.
    /// Unknown non-empty type URLs are rejected here, once, instead of at
    /// every call site.
    pub fn create_watch(
        &self,
        request: WatchRequest,
        downstream: mpsc::Sender<ResponseEnvelope>,
    ) -> Result<CombinedWatcher> {
        let serving = self.route(&request.type_url)?;

        let id = self.next_watcher_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let last_forwarded: Arc<Mutex<HashMap<TypeUrl, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut upstreams = Vec::with_capacity(serving.len());

        for cache in serving {
            let (tx, rx) = mpsc::channel(UPSTREAM_CHANNEL_CAPACITY);
            let mut upstream_request = request.clone();
            upstream_request.type_url = cache.type_url().clone();
            let watch_id = cache.create_watch(upstream_request, tx);
            upstreams.push((cache.clone(), watch_id));
            self.spawn_fan_in(id, cache.type_url().clone(), rx, downstream.clone(), cancel.clone(), last_forwarded.clone());
        }

        self.register(id, cancel.clone());
        Ok(CombinedWatcher { id, cancel, upstreams, registry: self.watchers.clone() })
    }

    /// Delta flavour of [`Self::create_watch`]. Upstreams that cannot serve
    /// incremental watches are skipped, logged once per watcher.
    pub fn create_delta_watch(
        &self,
        request: DeltaWatchRequest,
        downstream: mpsc::Sender<DeltaResponseEnvelope>,
    ) -> Result<CombinedWatcher> {
        let serving = self.route(&request.type_url)?;

        let id = self.next_watcher_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let mut upstreams = Vec::with_capacity(serving.len());

        for cache in serving {
            if !cache.supports_delta() {
                debug!(watcher_id = id, type_url = %cache.type_url(), "upstream does not support delta, skipping");
                continue;
            }
            let (tx, rx) = mpsc::channel(UPSTREAM_CHANNEL_CAPACITY);
            let mut upstream_request = request.clone();
            upstream_request.type_url = cache.type_url().clone();
            let watch_id = cache.create_delta_watch(upstream_request, tx);
            upstreams.push((cache.clone(), watch_id));
            self.spawn_delta_fan_in(id, rx, downstream.clone(), cancel.clone());
        }

        self.register(id, cancel.clone());
        Ok(CombinedWatcher { id, cancel, upstreams, registry: self.watchers.clone() })
    }

    /// One-shot fetch: the underlying caches are tried in registration
    /// order; the first answer wins. When nothing serves the type the
    /// protocol's "no resources of this kind" response (empty, version "0")
    /// is returned.
    pub fn fetch(&self, request: &WatchRequest) -> ResponseEnvelope {
        for cache in &self.caches {
            if cache.type_url() == &request.type_url {
                if let Some(response) = cache.fetch(request) {
                    return response;
                }
            }
        }
        ResponseEnvelope {
            type_url: request.type_url.clone(),
            version: "0".to_string(),
            resources: Vec::new(),
        }
    }

    /// Current state of every underlying cache, for the admin config dump.
    pub fn dump(&self) -> Vec<ResponseEnvelope> {
        self.caches
            .iter()
            .filter_map(|cache| cache.fetch(&WatchRequest::all(cache.type_url().clone())))
            .collect()
    }

    /// Open combined watchers. Test hook for the no-leak property.
    pub fn watcher_count(&self) -> usize {
        let watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.len()
    }

    fn route(&self, type_url: &TypeUrl) -> Result<Vec<Arc<dyn DiscoveryCache>>> {
        match type_url {
            TypeUrl::Unknown(url) if url.is_empty() => Ok(self.caches.clone()),
            TypeUrl::Unknown(url) => {
                Err(Error::cache(url.clone(), "type URL is not served by this control plane"))
            }
            known => {
                let serving: Vec<Arc<dyn DiscoveryCache>> =
                    self.caches.iter().filter(|c| c.type_url() == known).cloned().collect();
                if serving.is_empty() {
                    return Err(Error::cache(known.as_str(), "no cache registered for type URL"));
                }
                Ok(serving)
            }
        }
    }

    fn register(&self, id: u64, cancel: CancellationToken) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.insert(id, cancel);
    }

    fn spawn_fan_in(
        &self,
        watcher_id: u64,
        type_url: TypeUrl,
        mut rx: mpsc::Receiver<ResponseEnvelope>,
        downstream: mpsc::Sender<ResponseEnvelope>,
        cancel: CancellationToken,
        last_forwarded: Arc<Mutex<HashMap<TypeUrl, String>>>,
    ) {
        let metrics = self.metrics.clone();
        let task = {
            let metrics = metrics.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = rx.recv() => {
                            let Some(response) = received else {
                                // Upstream closed its side: this type is no
                                // longer available, other upstreams keep going.
                                debug!(watcher_id, %type_url, "upstream watch channel closed");
                                break;
                            };
                            // Claim the version before sending so two upstreams
                            // at the same version yield exactly one forward.
                            {
                                let mut last = last_forwarded.lock().unwrap_or_else(|e| e.into_inner());
                                if last.get(&response.type_url) == Some(&response.version) {
                                    continue;
                                }
                                last.insert(response.type_url.clone(), response.version.clone());
                            }
                            match tokio::time::timeout(DOWNSTREAM_SEND_TIMEOUT, downstream.send(response)).await {
                                Ok(Ok(())) => {
                                    metrics.control_plane_events_sent_total.with_label_values(&["sent"]).inc();
                                }
                                Ok(Err(_)) => break, // downstream dropped
                                Err(_) => {
                                    warn!(watcher_id, %type_url, "downstream send timed out, dropping response");
                                    metrics.control_plane_events_sent_total.with_label_values(&["dropped"]).inc();
                                }
                            }
                        }
                    }
                }
            }
        };
        spawn_supervised(metrics, watcher_id, task);
    }

    fn spawn_delta_fan_in(
        &self,
        watcher_id: u64,
        mut rx: mpsc::Receiver<DeltaResponseEnvelope>,
        downstream: mpsc::Sender<DeltaResponseEnvelope>,
        cancel: CancellationToken,
    ) {
        let metrics = self.metrics.clone();
        let task = {
            let metrics = metrics.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = rx.recv() => {
                            let Some(response) = received else { break };
                            match tokio::time::timeout(DOWNSTREAM_SEND_TIMEOUT, downstream.send(response)).await {
                                Ok(Ok(())) => {
                                    metrics.control_plane_events_sent_total.with_label_values(&["sent"]).inc();
                                }
                                Ok(Err(_)) => break,
                                Err(_) => {
                                    warn!(watcher_id, "downstream delta send timed out, dropping response");
                                    metrics.control_plane_events_sent_total.with_label_values(&["dropped"]).inc();
                                }
                            }
                        }
                    }
                }
            }
        };
        spawn_supervised(metrics, watcher_id, task);
    }
}

/// Run a watcher task, recovering any panic: the panic is logged with its
/// watcher id, counted, and the task exits cleanly without touching other
/// watchers or the process.
fn spawn_supervised<F>(metrics: Arc<ControlPlaneMetrics>, watcher_id: u64, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = std::panic::AssertUnwindSafe(task).catch_unwind().await {
            error!(
                watcher_id,
                panic = panic_text(panic.as_ref()),
                "recovered panic in combined watcher task"
            );
            metrics.panic_recoveries_total.with_label_values(&["combined_watcher"]).inc();
        }
    });
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Handle to one aggregated watcher. Cancelling closes the done token
/// exactly once, cancels every upstream watch, and removes the watcher from
/// the registry; the fan-in tasks then exit. Dropping the handle cancels.
pub struct CombinedWatcher {
    id: u64,
    cancel: CancellationToken,
    upstreams: Vec<(Arc<dyn DiscoveryCache>, WatchId)>,
    registry: WatcherRegistry,
}

impl CombinedWatcher {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent and non-blocking.
    pub fn cancel(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        for (cache, watch_id) in &self.upstreams {
            cache.cancel_watch(*watch_id);
        }
        let mut watchers = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        watchers.remove(&self.id);
    }
}

impl Drop for CombinedWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_type_url_is_rejected_at_the_boundary() {
        let combined = CombinedCache::new(Vec::new(), ControlPlaneMetrics::unregistered());
        let (tx, _rx) = mpsc::channel(4);
        let request = WatchRequest::all(TypeUrl::Unknown("vendor.example/v9.Widget".into()));
        assert!(combined.create_watch(request, tx).is_err());
    }

    #[tokio::test]
    async fn test_fetch_with_no_serving_cache_returns_version_zero() {
        let combined = CombinedCache::new(Vec::new(), ControlPlaneMetrics::unregistered());
        let response = combined.fetch(&WatchRequest::all(TypeUrl::Secret));
        assert_eq!(response.version, "0");
        assert!(response.resources.is_empty());
    }

    #[tokio::test]
    async fn test_supervised_task_panic_is_recovered_and_counted() {
        let metrics = ControlPlaneMetrics::unregistered();
        spawn_supervised(metrics.clone(), 7, async {
            panic!("watcher exploded");
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while metrics.panic_recoveries_total.with_label_values(&["combined_watcher"]).get() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "panic was never recovered");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
