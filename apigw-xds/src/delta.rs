use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use envoy_types::pb::envoy::service::discovery::v3::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, Resource as PbResource,
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tonic::Status;
use tracing::{debug, info, warn};

use apigw_cache::{CombinedCache, CombinedWatcher, DeltaResponseEnvelope, DeltaWatchRequest};
use apigw_core::TypeUrl;
use apigw_telemetry::ControlPlaneMetrics;

const STREAM_RESPONSE_CAPACITY: usize = 32;

struct DeltaSubscription {
    nonce: String,
    resource_names: Vec<String>,
    /// Per-resource versions this client has been sent, used to seed a
    /// replacement watch when the subscription changes.
    delivered: HashMap<String, String>,
}

/// Per-stream protocol state for incremental discovery.
struct DeltaSession {
    stream_id: i64,
    cache: Arc<CombinedCache>,
    metrics: Arc<ControlPlaneMetrics>,
    subscriptions: HashMap<TypeUrl, DeltaSubscription>,
    watchers: HashMap<TypeUrl, CombinedWatcher>,
    watch_tx: mpsc::Sender<DeltaResponseEnvelope>,
}

impl DeltaSession {
    fn handle_request(&mut self, request: DeltaDiscoveryRequest) -> Result<(), Status> {
        let type_url = TypeUrl::parse(&request.type_url);
        self.metrics.xds_stream_requests_total.with_label_values(&[type_url.as_str()]).inc();

        match self.subscriptions.get_mut(&type_url) {
            None => {
                let watch_request = DeltaWatchRequest {
                    type_url: type_url.clone(),
                    resource_names: request.resource_names_subscribe.clone(),
                    initial_versions: request.initial_resource_versions.clone(),
                };
                let watcher = self
                    .cache
                    .create_delta_watch(watch_request, self.watch_tx.clone())
                    .map_err(|e| Status::invalid_argument(e.to_string()))?;
                self.watchers.insert(type_url.clone(), watcher);
                self.subscriptions.insert(
                    type_url,
                    DeltaSubscription {
                        nonce: String::new(),
                        resource_names: request.resource_names_subscribe,
                        delivered: request.initial_resource_versions,
                    },
                );
                Ok(())
            }
            Some(subscription) => {
                if !request.response_nonce.is_empty()
                    && request.response_nonce != subscription.nonce
                {
                    debug!(
                        stream_id = self.stream_id,
                        type_url = %type_url,
                        "ignoring delta request with stale nonce"
                    );
                    self.metrics.xds_nonce_mismatch_total.inc();
                    return Ok(());
                }
                if let Some(detail) = &request.error_detail {
                    warn!(
                        stream_id = self.stream_id,
                        type_url = %type_url,
                        error = %detail.message,
                        "client rejected incremental configuration"
                    );
                    self.metrics.xds_snapshot_ack_total.with_label_values(&["nack"]).inc();
                } else if !request.response_nonce.is_empty() {
                    self.metrics.xds_snapshot_ack_total.with_label_values(&["ack"]).inc();
                }

                if !request.resource_names_subscribe.is_empty()
                    || !request.resource_names_unsubscribe.is_empty()
                {
                    self.change_subscription(type_url, request)?;
                }
                Ok(())
            }
        }
    }

    /// Apply subscribe/unsubscribe changes by replacing the watch, seeded
    /// with everything already delivered so the client is not resent state
    /// it holds.
    fn change_subscription(
        &mut self,
        type_url: TypeUrl,
        request: DeltaDiscoveryRequest,
    ) -> Result<(), Status> {
        if let Some(watcher) = self.watchers.remove(&type_url) {
            watcher.cancel();
        }
        let subscription = self
            .subscriptions
            .get_mut(&type_url)
            .ok_or_else(|| Status::internal("subscription vanished"))?;
        subscription
            .resource_names
            .retain(|name| !request.resource_names_unsubscribe.contains(name));
        for name in request.resource_names_subscribe {
            if !subscription.resource_names.contains(&name) {
                subscription.resource_names.push(name);
            }
        }
        let watch_request = DeltaWatchRequest {
            type_url: type_url.clone(),
            resource_names: subscription.resource_names.clone(),
            initial_versions: subscription.delivered.clone(),
        };
        let watcher = self
            .cache
            .create_delta_watch(watch_request, self.watch_tx.clone())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.watchers.insert(type_url, watcher);
        Ok(())
    }

    fn build_response(&mut self, envelope: DeltaResponseEnvelope) -> DeltaDiscoveryResponse {
        let nonce = uuid::Uuid::new_v4().to_string();
        if let Some(subscription) = self.subscriptions.get_mut(&envelope.type_url) {
            subscription.nonce = nonce.clone();
            for (resource, version) in &envelope.resources {
                subscription.delivered.insert(resource.name.clone(), version.clone());
            }
            for name in &envelope.removed {
                subscription.delivered.remove(name);
            }
        }
        DeltaDiscoveryResponse {
            system_version_info: envelope.system_version,
            resources: envelope
                .resources
                .into_iter()
                .map(|(resource, version)| PbResource {
                    name: resource.name.clone(),
                    version,
                    resource: Some(resource.body),
                    ..Default::default()
                })
                .collect(),
            removed_resources: envelope.removed,
            type_url: envelope.type_url.as_str().to_string(),
            nonce,
            ..Default::default()
        }
    }

    fn close(&mut self) {
        for (_, watcher) in self.watchers.drain() {
            watcher.cancel();
        }
    }
}

/// Drive one incremental stream to completion.
pub(crate) async fn run_delta_stream<S>(
    stream_id: i64,
    cache: Arc<CombinedCache>,
    metrics: Arc<ControlPlaneMetrics>,
    failure_flag: Arc<std::sync::atomic::AtomicBool>,
    mut requests: S,
    responses: mpsc::Sender<Result<DeltaDiscoveryResponse, Status>>,
) where
    S: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Unpin,
{
    let started = Instant::now();
    let (watch_tx, mut watch_rx) = mpsc::channel(STREAM_RESPONSE_CAPACITY);
    let mut session = DeltaSession {
        stream_id,
        cache,
        metrics: metrics.clone(),
        subscriptions: HashMap::new(),
        watchers: HashMap::new(),
        watch_tx,
    };
    metrics.control_plane_connection_state.inc();
    info!(stream_id, "incremental discovery stream opened");

    let mut failed = false;
    loop {
        tokio::select! {
            incoming = requests.next() => {
                match incoming {
                    Some(Ok(request)) => {
                        if let Err(status) = session.handle_request(request) {
                            warn!(stream_id, error = %status, "rejecting delta discovery request");
                            let _ = responses.send(Err(status)).await;
                            failed = true;
                            break;
                        }
                    }
                    Some(Err(status)) => {
                        warn!(stream_id, error = %status, "incremental discovery stream failed");
                        failed = true;
                        break;
                    }
                    None => break,
                }
            }
            Some(envelope) = watch_rx.recv() => {
                let response = session.build_response(envelope);
                if responses.send(Ok(response)).await.is_err() {
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
    info!(stream_id, "incremental discovery stream closed");
}
