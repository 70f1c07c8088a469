use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use apigw_core::GatewayConfig;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. The configured level (from
/// `GATEWAY_LOGGING_LEVEL` via the config layer) is the default; `RUST_LOG`
/// style directives still win when set explicitly. Safe to call more than
/// once; only the first call installs.
pub fn init_logging(config: &GatewayConfig) {
    let level = config.logging.level.clone();
    INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    });
}
