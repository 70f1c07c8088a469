use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use envoy_types::pb::envoy::service::discovery::v3::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tracing::info;

use apigw_cache::{CombinedCache, WatchRequest};
use apigw_core::TypeUrl;
use apigw_telemetry::ControlPlaneMetrics;

use crate::callbacks::Callbacks;
use crate::delta::run_delta_stream;
use crate::sotw::run_sotw_stream;

/// Queued responses per gRPC stream between the session task and tonic.
const OUTBOUND_CAPACITY: usize = 16;

/// The Aggregated Discovery Service implementation. One instance serves
/// every consumer (proxy and policy engine alike); per-stream state lives in
/// the session tasks.
pub struct AdsServer {
    cache: Arc<CombinedCache>,
    callbacks: Arc<dyn Callbacks>,
    metrics: Arc<ControlPlaneMetrics>,
    next_stream_id: AtomicI64,
    saw_failure: Arc<AtomicBool>,
}

impl AdsServer {
    pub fn new(
        cache: Arc<CombinedCache>,
        callbacks: Arc<dyn Callbacks>,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            cache,
            callbacks,
            metrics,
            next_stream_id: AtomicI64::new(1),
            saw_failure: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open_stream(&self) -> i64 {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        // A stream opening after any stream failed counts as a reconnection.
        if self.saw_failure.swap(false, Ordering::SeqCst) {
            self.metrics.control_plane_reconnections_total.inc();
        }
        self.callbacks.on_stream_open(stream_id);
        stream_id
    }

    #[cfg(test)]
    fn note_failure(&self) {
        self.saw_failure.store(true, Ordering::SeqCst);
    }

    /// One-shot fetch, exposed for the REST collaborator (`/config_dump`
    /// style reads). Not part of the gRPC surface; the published ADS
    /// contract carries only the two stream RPCs.
    pub fn fetch(&self, request: DiscoveryRequest) -> Result<DiscoveryResponse, Status> {
        self.callbacks.on_fetch(&request);
        let type_url = TypeUrl::parse(&request.type_url);
        let envelope = self.cache.fetch(&WatchRequest {
            type_url,
            resource_names: request.resource_names,
            known_version: request.version_info,
        });
        Ok(DiscoveryResponse {
            version_info: envelope.version,
            resources: envelope.resources.into_iter().map(|r| r.body).collect(),
            type_url: envelope.type_url.as_str().to_string(),
            nonce: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        })
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for AdsServer {
    type StreamAggregatedResourcesStream = ReceiverStream<Result<DiscoveryResponse, Status>>;

    async fn stream_aggregated_resources(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        let stream_id = self.open_stream();
        let requests = request.into_inner();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        tokio::spawn(run_sotw_stream(
            stream_id,
            self.cache.clone(),
            self.callbacks.clone(),
            self.metrics.clone(),
            self.saw_failure.clone(),
            requests,
            tx,
        ));
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    type DeltaAggregatedResourcesStream = ReceiverStream<Result<DeltaDiscoveryResponse, Status>>;

    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        let stream_id = self.open_stream();
        let requests = request.into_inner();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        tokio::spawn(run_delta_stream(
            stream_id,
            self.cache.clone(),
            self.metrics.clone(),
            self.saw_failure.clone(),
            requests,
            tx,
        ));
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Serve ADS on `addr` until the process stops. HTTP/2 keepalive probes idle
/// streams every 30 s and gives a peer 5 s to answer.
pub async fn serve(addr: SocketAddr, server: AdsServer) -> Result<(), tonic::transport::Error> {
    info!(%addr, "starting xDS server");
    Server::builder()
        .http2_keepalive_interval(Some(Duration::from_secs(30)))
        .http2_keepalive_timeout(Some(Duration::from_secs(5)))
        .add_service(AggregatedDiscoveryServiceServer::new(server))
        .serve(addr)
        .await
}
