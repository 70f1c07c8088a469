use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use envoy_types::pb::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tonic::Status;
use tracing::{debug, info, warn};

use apigw_cache::{CombinedCache, CombinedWatcher, ResponseEnvelope, WatchRequest};
use apigw_core::TypeUrl;
use apigw_telemetry::ControlPlaneMetrics;

use crate::callbacks::Callbacks;

/// Responses queued between the combined cache and the gRPC sender. Bounded:
/// a stuck stream backs pressure up to the combined cache, which then drops
/// rather than blocks.
const STREAM_RESPONSE_CAPACITY: usize = 32;

struct Subscription {
    /// Nonce of the most recent response for this type on this stream.
    nonce: String,
    /// Version carried by that response; the value an ack must echo.
    sent_version: String,
    last_acked: String,
    resource_names: Vec<String>,
}

/// Per-stream protocol state for state-of-the-world discovery. Owns one
/// combined watcher per subscribed type URL; all watchers feed the single
/// `watch_tx` channel drained by the stream loop.
struct SotwSession {
    stream_id: i64,
    cache: Arc<CombinedCache>,
    callbacks: Arc<dyn Callbacks>,
    metrics: Arc<ControlPlaneMetrics>,
    subscriptions: HashMap<TypeUrl, Subscription>,
    watchers: HashMap<TypeUrl, CombinedWatcher>,
    watch_tx: mpsc::Sender<ResponseEnvelope>,
}

impl SotwSession {
    /// Apply one client request: subscription, ack, nack, or stale noise.
    fn handle_request(&mut self, request: DiscoveryRequest) -> Result<(), Status> {
        let type_url = TypeUrl::parse(&request.type_url);
        self.metrics.xds_stream_requests_total.with_label_values(&[type_url.as_str()]).inc();
        self.callbacks.on_stream_request(self.stream_id, &request);

        match self.subscriptions.get_mut(&type_url) {
            None => self.subscribe(type_url, request),
            Some(subscription) => {
                // Ignore requests answering anything but our latest response
                // for this type; applying them would ack stale state.
                if !request.response_nonce.is_empty()
                    && request.response_nonce != subscription.nonce
                {
                    debug!(
                        stream_id = self.stream_id,
                        type_url = %type_url,
                        nonce = %request.response_nonce,
                        "ignoring request with stale nonce"
                    );
                    self.metrics.xds_nonce_mismatch_total.inc();
                    return Ok(());
                }

                if let Some(detail) = &request.error_detail {
                    // Nack: keep last_acked, never retry. The next version
                    // bump supersedes the rejected snapshot.
                    warn!(
                        stream_id = self.stream_id,
                        type_url = %type_url,
                        version = %request.version_info,
                        error = %detail.message,
                        "client rejected configuration"
                    );
                    self.metrics.xds_snapshot_ack_total.with_label_values(&["nack"]).inc();
                } else if request.version_info == subscription.sent_version {
                    subscription.last_acked = request.version_info.clone();
                    self.metrics.xds_snapshot_ack_total.with_label_values(&["ack"]).inc();
                }

                if request.resource_names != subscription.resource_names {
                    // Subscription change: replace the watch with one for the
                    // new name set.
                    self.resubscribe(type_url, request)?;
                }
                Ok(())
            }
        }
    }

    fn subscribe(&mut self, type_url: TypeUrl, request: DiscoveryRequest) -> Result<(), Status> {
        let watch_request = WatchRequest {
            type_url: type_url.clone(),
            resource_names: request.resource_names.clone(),
            known_version: request.version_info.clone(),
        };
        let watcher = self
            .cache
            .create_watch(watch_request, self.watch_tx.clone())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.watchers.insert(type_url.clone(), watcher);
        self.subscriptions.insert(
            type_url,
            Subscription {
                nonce: String::new(),
                sent_version: String::new(),
                last_acked: request.version_info,
                resource_names: request.resource_names,
            },
        );
        Ok(())
    }

    fn resubscribe(&mut self, type_url: TypeUrl, request: DiscoveryRequest) -> Result<(), Status> {
        if let Some(watcher) = self.watchers.remove(&type_url) {
            watcher.cancel();
        }
        let subscription = self.subscriptions.remove(&type_url);
        let mut request = request;
        if let Some(sub) = &subscription {
            // Keep the ack bookkeeping; only the watch changes.
            request.version_info = sub.last_acked.clone();
        }
        self.subscribe(type_url, request)
    }

    /// Turn a cache envelope into the wire response, stamping a fresh nonce.
    fn build_response(&mut self, envelope: ResponseEnvelope) -> DiscoveryResponse {
        let nonce = uuid::Uuid::new_v4().to_string();
        let response = DiscoveryResponse {
            version_info: envelope.version.clone(),
            resources: envelope.resources.into_iter().map(|r| r.body).collect(),
            type_url: envelope.type_url.as_str().to_string(),
            nonce: nonce.clone(),
            ..Default::default()
        };
        if let Some(subscription) = self.subscriptions.get_mut(&envelope.type_url) {
            subscription.nonce = nonce;
            subscription.sent_version = envelope.version;
        }
        self.callbacks.on_stream_response(self.stream_id, &response);
        response
    }

    fn close(&mut self) {
        for (_, watcher) in self.watchers.drain() {
            watcher.cancel();
        }
        self.callbacks.on_stream_closed(self.stream_id);
    }
}

/// Drive one state-of-the-world stream to completion: requests in, cache
/// envelopes out, watches cancelled on the way down. Returns once the client
/// disconnects or the transport fails.
pub(crate) async fn run_sotw_stream<S>(
    stream_id: i64,
    cache: Arc<CombinedCache>,
    callbacks: Arc<dyn Callbacks>,
    metrics: Arc<ControlPlaneMetrics>,
    failure_flag: Arc<std::sync::atomic::AtomicBool>,
    mut requests: S,
    responses: mpsc::Sender<Result<DiscoveryResponse, Status>>,
) where
    S: Stream<Item = Result<DiscoveryRequest, Status>> + Unpin,
{
    let started = Instant::now();
    let (watch_tx, mut watch_rx) = mpsc::channel(STREAM_RESPONSE_CAPACITY);
    let mut session = SotwSession {
        stream_id,
        cache,
        callbacks,
        metrics: metrics.clone(),
        subscriptions: HashMap::new(),
        watchers: HashMap::new(),
        watch_tx,
    };
    metrics.control_plane_connection_state.inc();
    info!(stream_id, "discovery stream opened");

    let mut failed = false;
    loop {
        tokio::select! {
            incoming = requests.next() => {
                match incoming {
                    Some(Ok(request)) => {
                        if let Err(status) = session.handle_request(request) {
                            warn!(stream_id, error = %status, "rejecting discovery request");
                            let _ = responses.send(Err(status)).await;
                            failed = true;
                            break;
                        }
                    }
                    Some(Err(status)) => {
                        warn!(stream_id, error = %status, "discovery stream failed");
                        failed = true;
                        break;
                    }
                    None => break,
                }
            }
            Some(envelope) = watch_rx.recv() => {
                let response = session.build_response(envelope);
                if responses.send(Ok(response)).await.is_err() {
                    // Receiver gone: the client went away mid-send.
                    failed = true;
                    break;
                }
            }
        }
    }

    session.close();
    if failed {
        failure_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }
    metrics.control_plane_connection_state.dec();
    metrics.xds_stream_duration_seconds.observe(started.elapsed().as_secs_f64());
    info!(stream_id, failed, "discovery stream closed");
}
