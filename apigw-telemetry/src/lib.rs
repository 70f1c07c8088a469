//! Observability plumbing: the control-plane metric set backed by an
//! explicit Prometheus registry, and tracing initialisation driven by the
//! gateway configuration. Components receive a `ControlPlaneMetrics` handle
//! at construction; nothing registers into a global.

mod init;
mod metrics;

pub use init::init_logging;
pub use metrics::ControlPlaneMetrics;
