use std::sync::Arc;

use tracing::info;

use apigw_core::{CorrelationId, GatewayConfig};
use apigw_server::ControlPlane;
use apigw_telemetry::init_logging;
use apigw_xds::LoggingCallbacks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    init_logging(&config);

    let plane = ControlPlane::new(config.clone())?;
    let correlation_id = CorrelationId::random();
    plane.initial_sync(&correlation_id).await?;
    info!(
        storage = ?config.storage.storage_type,
        correlation_id = %correlation_id,
        "control plane initialised"
    );

    let addr = format!("{}:{}", config.xds.host, config.xds.port).parse()?;
    let server = plane.ads_server(Arc::new(LoggingCallbacks));
    apigw_xds::serve(addr, server).await?;
    Ok(())
}
