use envoy_types::pb::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};

/// Observability hooks invoked by the server at stream lifecycle points.
/// Every method has a no-op default, so implementations override only what
/// they watch.
pub trait Callbacks: Send + Sync {
    fn on_stream_open(&self, _stream_id: i64) {}

    fn on_stream_closed(&self, _stream_id: i64) {}

    fn on_stream_request(&self, _stream_id: i64, _request: &DiscoveryRequest) {}

    fn on_stream_response(&self, _stream_id: i64, _response: &DiscoveryResponse) {}

    fn on_fetch(&self, _request: &DiscoveryRequest) {}
}

/// The default callback set: does nothing.
#[derive(Default)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}

/// Logs stream lifecycle events at debug level. The composition root
/// installs this one unless an embedder provides its own.
#[derive(Default)]
pub struct LoggingCallbacks;

impl Callbacks for LoggingCallbacks {
    fn on_stream_open(&self, stream_id: i64) {
        tracing::debug!(stream_id, "stream opened");
    }

    fn on_stream_closed(&self, stream_id: i64) {
        tracing::debug!(stream_id, "stream closed");
    }

    fn on_stream_request(&self, stream_id: i64, request: &DiscoveryRequest) {
        tracing::debug!(
            stream_id,
            type_url = %request.type_url,
            version = %request.version_info,
            names = request.resource_names.len(),
            "stream request"
        );
    }

    fn on_stream_response(&self, stream_id: i64, response: &DiscoveryResponse) {
        tracing::debug!(
            stream_id,
            type_url = %response.type_url,
            version = %response.version_info,
            resources = response.resources.len(),
            "stream response"
        );
    }

    fn on_fetch(&self, request: &DiscoveryRequest) {
        tracing::debug!(type_url = %request.type_url, "fetch");
    }
}
